//! End-to-end scenarios against the full engine: ECS world, host adapter and
//! facility together.

use cellblock_core::prelude::*;
use cellblock_logic::door_ops::DoorPhase;
use cellblock_logic::error::TransitionRejected;
use cellblock_logic::escort::{FINGERPRINT, MUGSHOT, STORAGE_DROP_OFF};
use cellblock_logic::guard::GuardState;
use cellblock_logic::rap_sheet::ViolationKind;

const DT: f32 = 0.1;

fn engine() -> SimulationEngine {
    let config = FacilityConfig {
        cell_count: 4,
        ..FacilityConfig::default()
    };
    SimulationEngine::new(config, 1234)
}

fn run(engine: &mut SimulationEngine, seconds: f32) -> Vec<FacilityEvent> {
    let steps = (seconds / DT).round() as usize;
    for _ in 0..steps {
        engine.update(DT);
    }
    engine.drain_events()
}

fn count(events: &[FacilityEvent], pred: impl Fn(&FacilityEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn guard_walks_into_cell_three() {
    let mut engine = engine();
    let guard = engine.spawn_guard(Vec3::new(14.0, 0.0, 0.0), false);

    engine.begin_transition(guard, "CellDoor_3", None).unwrap();
    assert_eq!(engine.facility().doors().phase(guard), DoorPhase::MovingToEntry);

    let events = run(&mut engine, 8.0);

    let phases: Vec<DoorPhase> = events
        .iter()
        .filter_map(|e| match e {
            FacilityEvent::PhaseEntered { actor, phase, .. } if *actor == guard => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            DoorPhase::MovingToEntry,
            DoorPhase::SecurityCheckEntry,
            DoorPhase::Opening,
            DoorPhase::MovingToExit,
            DoorPhase::SecurityCheckExit,
            DoorPhase::Closing,
            DoorPhase::Complete,
        ]
    );
    assert_eq!(
        count(&events, |e| matches!(e, FacilityEvent::TransitionCompleted { .. })),
        1
    );

    let door = engine.door("Cell_3_Door").unwrap();
    assert!(door.closed && door.locked);
    let inside = engine.position(guard).unwrap();
    assert!(inside.distance(&Vec3::new(14.0, 4.0, 0.0)) < 0.5);
    assert!(!engine.facility().is_busy(guard));
}

#[test]
fn second_actor_on_held_door_is_turned_away() {
    let mut engine = engine();
    let first = engine.spawn_guard(Vec3::new(6.0, 0.0, 0.0), false);
    let second = engine.spawn_guard(Vec3::new(7.0, 0.0, 0.0), false);

    engine.begin_transition(first, "CellDoor_1", None).unwrap();
    assert_eq!(
        engine.begin_transition(second, "CellDoorExit_1", None),
        Err(TransitionRejected::DoorBusy {
            door: "Cell_1_Door".into(),
            holder: first
        })
    );
    assert_eq!(
        engine.begin_transition(first, "CellDoor_2", None),
        Err(TransitionRejected::ActorBusy(first))
    );

    run(&mut engine, 8.0);
    assert!(engine.begin_transition(second, "CellDoorExit_1", None).is_ok());
}

#[test]
fn stuck_escort_reminds_until_stopped_then_breach_recovers() {
    let mut engine = engine();
    let guard = engine.spawn_guard(Vec3::new(14.0, 0.0, 0.0), false);
    let inmate = engine.spawn_inmate(Vec3::new(10.0, 0.0, 0.0), InmateProfile::default());

    engine.begin_transition(guard, "CellDoor_3", Some(inmate)).unwrap();
    let events = run(&mut engine, 20.0);

    assert_eq!(engine.facility().doors().phase(guard), DoorPhase::WaitingForEscort);
    assert_eq!(
        count(&events, |e| matches!(e, FacilityEvent::EscortReminder { .. })),
        3
    );
    assert_eq!(
        engine
            .transcripts()
            .iter()
            .filter(|t| t.actor == inmate)
            .count(),
        3
    );

    assert!(engine.stop_operation(guard));
    let after_stop = run(&mut engine, 10.0);
    assert_eq!(
        count(&after_stop, |e| matches!(e, FacilityEvent::EscortReminder { .. })),
        0
    );
    // Abandoned open; nothing closes it until the breach check does
    assert!(!engine.door("Cell_3_Door").unwrap().closed);

    let late = run(&mut engine, 10.0);
    let breaches = count(&late, |e| {
        matches!(e, FacilityEvent::SecurityBreach { door, opened_by, .. } if door == "Cell_3_Door" && *opened_by == guard)
    });
    assert_eq!(breaches, 1);
    let door = engine.door("Cell_3_Door").unwrap();
    assert!(door.closed && door.locked);
}

#[test]
fn contraband_search_ends_in_booking() {
    let mut engine = engine();
    let guard = engine.spawn_guard(Vec3::new(14.0, -4.0, 0.0), false);
    let inmate = engine.spawn_inmate(
        Vec3::new(10.0, -4.0, 0.0),
        InmateProfile {
            contraband: 2,
            ..InmateProfile::default()
        },
    );

    let events = run(&mut engine, 10.0);
    assert!(events.iter().any(|e| matches!(
        e,
        FacilityEvent::GuardStateChanged { to: GuardState::PatDown, target: Some(t), .. } if *t == inmate
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, FacilityEvent::SearchCompleted { target, .. } if *target == inmate)));
    assert_eq!(engine.contraband(inmate), 0);
    assert!(engine.facility().escorts().is_escorting(guard));
    assert!(engine.is_following(inmate));

    let sheet = engine.records().get(inmate).unwrap();
    assert_eq!(sheet.times_searched, 1);
    assert_eq!(sheet.contraband_count, 2);
    assert_eq!(sheet.count(ViolationKind::Contraband), 1);
    assert!(!sheet.booked);

    let events = run(&mut engine, 70.0);
    let stations: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            FacilityEvent::StationCompleted { station, timed_out: false, .. } => Some(station.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(stations, vec![MUGSHOT, FINGERPRINT, STORAGE_DROP_OFF]);
    assert!(events.iter().any(|e| matches!(
        e,
        FacilityEvent::TransitionCompleted { transition, .. } if transition == "BookingEnter"
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, FacilityEvent::EscortCompleted { prisoner, .. } if *prisoner == inmate)));

    assert!(engine.records().get(inmate).unwrap().booked);
    assert!(!engine.is_following(inmate));
    assert!(!engine.facility().is_busy(guard));
    assert_eq!(engine.facility().guard(guard).unwrap().state(), GuardState::Idle);
    let booking = engine.door("BookingDoor").unwrap();
    assert!(booking.closed && booking.locked);
}

#[test]
fn patrol_crosses_guard_room_door() {
    let mut engine = engine();
    engine.populate(1, 0);

    let events = run(&mut engine, 60.0);
    assert!(events.iter().any(|e| matches!(
        e,
        FacilityEvent::TransitionCompleted { transition, .. } if transition == "GuardRoomEnter"
    )));
    let door = engine.door("GuardRoomDoor").unwrap();
    assert!(door.closed);
    assert!(!door.locked);
}

#[test]
fn secure_all_relocks_opened_cells() {
    let mut engine = engine();
    let guard = engine.spawn_guard(Vec3::new(2.0, 0.0, 0.0), false);

    engine.begin_transition(guard, "CellDoor_0", None).unwrap();
    run(&mut engine, 3.0);
    assert!(!engine.door("Cell_0_Door").unwrap().closed);
    engine.stop_operation(guard);

    // 4 cells, holding cell and booking door
    assert_eq!(engine.secure_all(), 6);
    let door = engine.door("Cell_0_Door").unwrap();
    assert!(door.closed && door.locked);
}

#[test]
fn records_survive_save_and_load() {
    let mut engine = engine();
    let guard = engine.spawn_guard(Vec3::new(14.0, -4.0, 0.0), false);
    let inmate = engine.spawn_inmate(Vec3::new(12.0, -4.0, 0.0), InmateProfile::default());

    assert!(engine.request_search(guard, inmate));
    run(&mut engine, 7.0);
    let before = engine.records().clone();
    assert_eq!(before.get(inmate).unwrap().times_searched, 1);

    let mut buffer = Vec::new();
    engine.save(&mut buffer).unwrap();

    let mut restored = self::engine();
    restored.load_records(buffer.as_slice()).unwrap();
    assert_eq!(restored.records(), &before);
}
