//! Cellblock Headless Scenario Harness
//!
//! Drives the full engine (ECS world, host adapter, facility) through a set
//! of jail scenarios and checks the outcome of each.
//! Runs entirely in-process, no rendering and no host game.
//!
//! Usage:
//!   cargo run -p cellblock-simtest
//!   cargo run -p cellblock-simtest -- --verbose
//!   cargo run -p cellblock-simtest -- --config block.json
//!
//! Log output follows `RUST_LOG` (default `warn`, `info` with `--verbose`).

use std::path::Path;

use cellblock_core::prelude::*;
use cellblock_logic::config::validate_config;
use cellblock_logic::door_ops::DoorPhase;
use cellblock_logic::error::{RegistryError, TransitionRejected};
use cellblock_logic::events::FacilityEvent as Event;
use cellblock_logic::guard::GuardState;
use cellblock_logic::rap_sheet::ViolationKind;
use cellblock_logic::registry::{cell_door, cell_points};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DT: f32 = 0.1;
const SEED: u64 = 7;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn check(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed,
            detail: detail.into(),
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    init_logging(verbose);

    println!("=== Cellblock Scenario Harness ===\n");

    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => match load_config(Path::new(path)) {
                Ok(config) => config,
                Err(message) => {
                    eprintln!("{message}");
                    std::process::exit(2);
                }
            },
            None => {
                eprintln!("--config needs a path");
                std::process::exit(2);
            }
        },
        None => FacilityConfig::default(),
    };

    let mut results = Vec::new();

    // 1. Configuration
    results.extend(validate_configuration(&config, verbose));
    if results.iter().any(|r| !r.passed) {
        report(&results, verbose);
    }

    // 2. Single door crossing
    results.extend(validate_cell_crossing(&config, verbose));

    // 3. Door token contention
    results.extend(validate_door_token(&config, verbose));

    // 4. Stuck escort and breach recovery
    results.extend(validate_stuck_escort(&config, verbose));

    // 5. Search to booking
    results.extend(validate_search_to_booking(&config, verbose));

    // 6. Intervention
    results.extend(validate_intervention(&config, verbose));

    // 7. Patrol through the guard room
    results.extend(validate_patrol(&config, verbose));

    // 8. Populated block
    results.extend(validate_populated_block(&config, verbose));

    // 9. Records persistence
    results.extend(validate_persistence(&config, verbose));

    report(&results, verbose);
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: &Path) -> Result<FacilityConfig, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let config: FacilityConfig = serde_json::from_str(&text)
        .map_err(|e| format!("invalid config {}: {e}", path.display()))?;
    info!("loaded config from {}", path.display());
    Ok(config)
}

fn report(results: &[TestResult], verbose: bool) -> ! {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    std::process::exit(if failed > 0 { 1 } else { 0 });
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn engine(config: &FacilityConfig) -> SimulationEngine {
    SimulationEngine::new(config.clone(), SEED)
}

fn run(engine: &mut SimulationEngine, seconds: f32) -> Vec<Event> {
    let steps = (seconds / DT).round() as usize;
    for _ in 0..steps {
        engine.update(DT);
    }
    engine.drain_events()
}

fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

/// Index of the last cell and the corridor spot in front of it
fn last_cell(engine: &SimulationEngine) -> (u32, Vec3) {
    let index = engine.layout().cell_count.saturating_sub(1);
    let (outside, _) = cell_points(index);
    let x = engine.layout().point(&outside).map_or(0.0, |p| p.x);
    (index, Vec3::new(x, 0.0, 0.0))
}

fn door_state(engine: &SimulationEngine, name: &str) -> (bool, bool) {
    engine.door(name).map_or((false, false), |d| (d.closed, d.locked))
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_configuration(config: &FacilityConfig, verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();

    let errors = validate_config(config);
    results.push(TestResult::check(
        "config_valid",
        errors.is_empty(),
        if errors.is_empty() {
            format!("{} cells", config.cell_count)
        } else {
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        },
    ));

    let mut broken = config.clone();
    broken.cell_count = 0;
    broken.guard.scan_interval = -1.0;
    let broken_errors = validate_config(&broken);
    results.push(TestResult::check(
        "config_rejects_broken",
        broken_errors.len() >= 2,
        format!("{} problems reported", broken_errors.len()),
    ));

    let engine = engine(config);
    let cells = engine
        .layout()
        .doors()
        .filter(|(name, _)| name.starts_with("Cell_"))
        .count();
    results.push(TestResult::check(
        "layout_has_every_cell",
        cells == config.cell_count as usize,
        format!("{cells} cell doors"),
    ));

    let usable = engine.facility().registry().len();
    results.push(TestResult::check(
        "registry_resolves_transitions",
        usable > 0,
        format!("{usable} usable transitions"),
    ));

    if verbose {
        for (name, class) in engine.layout().doors() {
            debug!("door {name}: {class:?}");
        }
    }

    results
}

// ── 2. Cell Crossing ────────────────────────────────────────────────────

fn validate_cell_crossing(config: &FacilityConfig, _verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    let (index, corridor) = last_cell(&engine);
    let guard = engine.spawn_guard(corridor, false);
    let transition = format!("CellDoor_{index}");

    let began = engine.begin_transition(guard, &transition, None);
    results.push(TestResult::check(
        "crossing_accepted",
        began.is_ok(),
        format!("{transition}: {began:?}"),
    ));

    let events = run(&mut engine, 15.0);
    let phases: Vec<DoorPhase> = events
        .iter()
        .filter_map(|e| match e {
            Event::PhaseEntered { actor, phase, .. } if *actor == guard => Some(*phase),
            _ => None,
        })
        .collect();
    let expected = [
        DoorPhase::MovingToEntry,
        DoorPhase::SecurityCheckEntry,
        DoorPhase::Opening,
        DoorPhase::MovingToExit,
        DoorPhase::SecurityCheckExit,
        DoorPhase::Closing,
        DoorPhase::Complete,
    ];
    results.push(TestResult::check(
        "crossing_phase_order",
        phases == expected,
        format!("{phases:?}"),
    ));

    let (closed, locked) = door_state(&engine, &cell_door(index));
    results.push(TestResult::check(
        "crossing_relocks_cell",
        closed && locked,
        format!("closed={closed} locked={locked}"),
    ));
    results.push(TestResult::check(
        "crossing_frees_actor",
        !engine.facility().is_busy(guard),
        "no operation left",
    ));

    results
}

// ── 3. Door Token ───────────────────────────────────────────────────────

fn validate_door_token(config: &FacilityConfig, _verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    let (index, corridor) = last_cell(&engine);
    let first = engine.spawn_guard(corridor, false);
    let second = engine.spawn_guard(Vec3::new(corridor.x + 1.0, 0.0, 0.0), false);

    let _ = engine.begin_transition(first, &format!("CellDoor_{index}"), None);
    let contested = engine.begin_transition(second, &format!("CellDoorExit_{index}"), None);
    results.push(TestResult::check(
        "token_rejects_second_actor",
        matches!(contested, Err(TransitionRejected::DoorBusy { holder, .. }) if holder == first),
        format!("{contested:?}"),
    ));

    let again = engine.begin_transition(first, &format!("CellDoorExit_{index}"), None);
    results.push(TestResult::check(
        "token_rejects_busy_actor",
        again == Err(TransitionRejected::ActorBusy(first)),
        format!("{again:?}"),
    ));

    let unknown = engine.begin_transition(second, "NoSuchDoor", None);
    results.push(TestResult::check(
        "unknown_transition_rejected",
        matches!(
            unknown,
            Err(TransitionRejected::Registry(RegistryError::NotFound(_)))
        ),
        format!("{unknown:?}"),
    ));

    run(&mut engine, 15.0);
    let released = engine.begin_transition(second, &format!("CellDoorExit_{index}"), None);
    results.push(TestResult::check(
        "token_released_after_completion",
        released.is_ok(),
        format!("{released:?}"),
    ));

    results
}

// ── 4. Stuck Escort ─────────────────────────────────────────────────────

fn validate_stuck_escort(config: &FacilityConfig, verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    let (index, corridor) = last_cell(&engine);
    let door = cell_door(index);
    let guard = engine.spawn_guard(corridor, false);
    // Far enough that the inmate never reaches the pass distance on its own
    let inmate = engine.spawn_inmate(
        Vec3::new((corridor.x - 4.0).max(0.5), 0.0, 0.0),
        InmateProfile::default(),
    );

    let _ = engine.begin_transition(guard, &format!("CellDoor_{index}"), Some(inmate));
    let events = run(&mut engine, 20.0);
    let reminders = count(&events, |e| matches!(e, Event::EscortReminder { .. }));
    let phase = engine.facility().doors().phase(guard);
    results.push(TestResult::check(
        "escort_wait_sends_reminders",
        phase == DoorPhase::WaitingForEscort && reminders >= 1,
        format!("{phase:?}, {reminders} reminders"),
    ));
    let spoken = engine
        .transcripts()
        .iter()
        .filter(|t| t.actor == inmate)
        .count();
    results.push(TestResult::check(
        "reminders_reach_inmate",
        spoken == reminders,
        format!("{spoken} lines spoken to {inmate}"),
    ));
    if verbose {
        for line in engine.transcripts() {
            debug!("[{:.1}] to {}: {}", line.at, line.actor, line.text);
        }
    }

    let stopped = engine.stop_operation(guard);
    let (closed, _) = door_state(&engine, &door);
    results.push(TestResult::check(
        "stop_leaves_door_open",
        stopped && !closed,
        format!("stopped={stopped} closed={closed}"),
    ));

    let window = (config.ledger.max_open_seconds + 2.0 * config.ledger.breach_check_interval) as f32;
    let events = run(&mut engine, window);
    let breaches = count(&events, |e| {
        matches!(e, Event::SecurityBreach { door: d, opened_by, .. } if *d == door && *opened_by == guard)
    });
    let (closed, locked) = door_state(&engine, &door);
    results.push(TestResult::check(
        "breach_reported_once",
        breaches == 1,
        format!("{breaches} breaches"),
    ));
    results.push(TestResult::check(
        "breach_relocks_door",
        closed && locked,
        format!("closed={closed} locked={locked}"),
    ));

    results
}

// ── 5. Search To Booking ────────────────────────────────────────────────

fn validate_search_to_booking(config: &FacilityConfig, verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    let guard = engine.spawn_guard(Vec3::new(8.0, -4.0, 0.0), false);
    let inmate = engine.spawn_inmate(
        Vec3::new(6.0, -4.0, 0.0),
        InmateProfile {
            contraband: 3,
            ..InmateProfile::default()
        },
    );

    let events = run(&mut engine, 10.0);
    let searched = count(&events, |e| {
        matches!(e, Event::SearchCompleted { target, .. } if *target == inmate)
    });
    results.push(TestResult::check(
        "scan_leads_to_search",
        searched == 1,
        format!("{searched} searches"),
    ));
    results.push(TestResult::check(
        "contraband_confiscated",
        engine.contraband(inmate) == 0,
        format!("{} items left", engine.contraband(inmate)),
    ));
    let cited = engine
        .records()
        .get(inmate)
        .map_or(0, |s| s.count(ViolationKind::Contraband));
    results.push(TestResult::check(
        "contraband_cited",
        cited == 1,
        format!("{cited} contraband violations"),
    ));

    let events = run(&mut engine, 90.0);
    let stations = count(&events, |e| matches!(e, Event::StationCompleted { .. }));
    results.push(TestResult::check(
        "booking_visits_stations",
        stations == engine.layout().booking_route().len(),
        format!("{stations} stations completed"),
    ));
    if verbose {
        for event in &events {
            if let Event::StationCompleted { station, timed_out, .. } = event {
                debug!("station {station} (timed_out={timed_out})");
            }
        }
    }
    let booked = engine.records().get(inmate).is_some_and(|s| s.booked);
    results.push(TestResult::check(
        "inmate_booked",
        booked && !engine.is_following(inmate),
        format!("booked={booked}"),
    ));
    let state = engine.facility().guard(guard).map(|g| g.state());
    results.push(TestResult::check(
        "guard_back_to_idle",
        state == Some(GuardState::Idle) && !engine.facility().is_busy(guard),
        format!("{state:?}"),
    ));
    let (closed, locked) = door_state(&engine, "BookingDoor");
    results.push(TestResult::check(
        "booking_door_secured",
        closed && locked,
        format!("closed={closed} locked={locked}"),
    ));

    results
}

// ── 6. Intervention ─────────────────────────────────────────────────────

fn validate_intervention(config: &FacilityConfig, _verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    let guard = engine.spawn_guard(Vec3::new(8.0, -4.0, 0.0), false);
    let inmate = engine.spawn_inmate(Vec3::new(6.0, -4.0, 0.0), InmateProfile::default());
    engine.set_agitation(inmate, 1.0);

    let events = run(&mut engine, 6.0);
    let resolved = events.iter().find_map(|e| match e {
        Event::InterventionResolved { guard: g, target, calmed } if *g == guard && *target == inmate => {
            Some(*calmed)
        }
        _ => None,
    });
    results.push(TestResult::check(
        "aggression_triggers_intervention",
        resolved == Some(true),
        format!("calmed={resolved:?}"),
    ));
    let disorderly = engine
        .records()
        .get(inmate)
        .map_or(0, |s| s.count(ViolationKind::Disorderly));
    results.push(TestResult::check(
        "intervention_cited",
        disorderly == 1,
        format!("{disorderly} disorderly violations"),
    ));

    results
}

// ── 7. Patrol ───────────────────────────────────────────────────────────

fn validate_patrol(config: &FacilityConfig, _verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    engine.populate(1, 0);

    let events = run(&mut engine, 120.0);
    let crossings = count(&events, |e| {
        matches!(e, Event::TransitionCompleted { transition, .. } if transition.starts_with("GuardRoom"))
    });
    results.push(TestResult::check(
        "patrol_uses_guard_room_door",
        crossings >= 2,
        format!("{crossings} guard room crossings"),
    ));
    let (_, locked) = door_state(&engine, "GuardRoomDoor");
    results.push(TestResult::check(
        "guard_room_never_locked",
        !locked,
        format!("locked={locked}"),
    ));

    results
}

// ── 8. Populated Block ──────────────────────────────────────────────────

fn validate_populated_block(config: &FacilityConfig, verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    engine.populate(3, 12);

    let mut events = Vec::new();
    for _ in 0..10 {
        events.extend(run(&mut engine, 30.0));
    }

    results.push(TestResult::check(
        "population_survives",
        engine.guard_count() == 3 && engine.inmate_count() == 12,
        format!("{} guards, {} inmates", engine.guard_count(), engine.inmate_count()),
    ));

    let failures = count(&events, |e| matches!(e, Event::TransitionFailed { .. }));
    results.push(TestResult::check(
        "no_failed_crossings",
        failures == 0,
        format!("{} events, {failures} failed crossings", events.len()),
    ));

    let changes = count(&events, |e| matches!(e, Event::GuardStateChanged { .. }));
    let searches = count(&events, |e| matches!(e, Event::SearchCompleted { .. }));
    let interventions = count(&events, |e| matches!(e, Event::InterventionResolved { .. }));
    results.push(TestResult::check(
        "guards_stay_active",
        changes > 0,
        format!("{changes} state changes, {searches} searches, {interventions} interventions"),
    ));

    let booked = engine.records().iter().filter(|s| s.booked).count();
    let pending = engine.pending_bookings().count();
    if verbose {
        info!("populated run: {booked} booked, {pending} waiting");
        for sheet in engine.records().iter() {
            debug!(
                "{} ({}): {} violations, booked={}",
                sheet.name,
                sheet.actor,
                sheet.violations.len(),
                sheet.booked
            );
        }
    }

    let secured = engine.secure_all();
    let unsecured: Vec<String> = engine
        .layout()
        .doors()
        .filter_map(|(name, _)| engine.door(name).map(|d| (name.to_string(), d)))
        .filter(|(_, d)| d.class.is_always_secure() && !(d.closed && d.locked))
        .map(|(name, _)| name)
        .collect();
    results.push(TestResult::check(
        "secure_all_locks_block",
        unsecured.is_empty(),
        format!("{secured} secured, left open: {unsecured:?}"),
    ));

    results
}

// ── 9. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(config: &FacilityConfig, _verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = engine(config);
    let guard = engine.spawn_guard(Vec3::new(8.0, -4.0, 0.0), false);
    let inmate = engine.spawn_inmate(Vec3::new(7.0, -4.0, 0.0), InmateProfile::default());
    engine.request_search(guard, inmate);
    run(&mut engine, 8.0);

    let mut buffer = Vec::new();
    let saved = engine.save(&mut buffer);
    results.push(TestResult::check(
        "records_saved",
        saved.is_ok() && !buffer.is_empty(),
        format!("{} bytes", buffer.len()),
    ));

    let mut restored = self::engine(config);
    let loaded = restored.load_records(buffer.as_slice());
    results.push(TestResult::check(
        "records_restored",
        loaded.is_ok() && restored.records() == engine.records(),
        format!("{} records", restored.records().len()),
    ));

    let truncated = restored.load_records(&buffer[..buffer.len() / 2]);
    results.push(TestResult::check(
        "truncated_save_rejected",
        truncated.is_err(),
        format!("{truncated:?}"),
    ));

    results
}
