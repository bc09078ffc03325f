//! Multi-station escorts.
//!
//! A guard walks a prisoner through an ordered list of stations. At each
//! station the guard goes to the anchor first (crossing the station's door with
//! the prisoner when it names one), then waits until the prisoner has stood
//! still near the anchor for the station's dwell time. A stalled station is
//! abandoned after `station_timeout` and the escort moves on; one stuck
//! prisoner never fails the whole escort.
//!
//! Stations complete strictly in list order, so `completed` is always a prefix
//! of the station names.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::EscortConfig;
use crate::door_ops::DoorTransitionEngine;
use crate::error::{EscortRejected, TransitionRejected};
use crate::events::FacilityEvent;
use crate::geometry::Vec3;
use crate::ledger::DoorSecurityLedger;
use crate::ports::JailWorld;
use crate::registry::DoorRegistry;
use crate::{ActorId, SimTime};

pub const MUGSHOT: &str = "Mugshot";
pub const FINGERPRINT: &str = "Fingerprint";
pub const STORAGE_DROP_OFF: &str = "StorageDropOff";

const GUIDANCE_PROMPT: &str = "Stay with the officer.";
/// Guard counts as at the station within this distance of its goal.
const STATION_ARRIVAL_RADIUS: f32 = 0.5;

/// A stop on an escort route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub anchor: Vec3,
    /// Seconds the prisoner must stand still at the anchor.
    pub dwell: f64,
    /// Door transition the pair crosses before walking to the anchor.
    pub transition: Option<String>,
}

impl Station {
    pub fn new(name: impl Into<String>, anchor: Vec3, dwell: f64) -> Self {
        Self {
            name: name.into(),
            anchor,
            dwell,
            transition: None,
        }
    }

    pub fn through(mut self, transition: impl Into<String>) -> Self {
        self.transition = Some(transition.into());
        self
    }
}

/// The booking route: mugshot, fingerprints, then property storage.
pub fn booking_stations(mugshot: Vec3, fingerprint: Vec3, storage: Vec3) -> Vec<Station> {
    vec![
        Station::new(MUGSHOT, mugshot, 3.0),
        Station::new(FINGERPRINT, fingerprint, 4.0),
        Station::new(STORAGE_DROP_OFF, storage, 2.0),
    ]
}

/// Where the session is within the current station.
#[derive(Debug, Clone, PartialEq)]
pub enum EscortStep {
    /// About to start the next station.
    Starting,
    /// The door engine is running this station's crossing.
    Crossing,
    /// Guard walking to `goal` (the anchor or a recomputed point near it).
    Moving { goal: Vec3 },
    /// Guard at the station, watching the prisoner.
    Waiting {
        since: SimTime,
        still_for: f64,
        last_sample: Vec3,
        sampled_at: SimTime,
    },
}

#[derive(Debug, Clone)]
pub struct EscortSession {
    pub guard: ActorId,
    pub prisoner: ActorId,
    pub stations: Vec<Station>,
    /// Index of the next incomplete station.
    pub next: usize,
    pub completed: Vec<String>,
    pub step: EscortStep,
    pub started_at: SimTime,
    far_since: Option<SimTime>,
}

impl EscortSession {
    /// Completed / total.
    pub fn progress(&self) -> f32 {
        if self.stations.is_empty() {
            return 1.0;
        }
        self.completed.len() as f32 / self.stations.len() as f32
    }

    pub fn current_station(&self) -> Option<&Station> {
        self.stations.get(self.next)
    }
}

/// Mutable facility state an escort tick drives.
pub struct EscortDeps<'a> {
    pub doors: &'a mut DoorTransitionEngine,
    pub registry: &'a DoorRegistry,
    pub ledger: &'a mut DoorSecurityLedger,
    pub events: &'a mut Vec<FacilityEvent>,
}

enum Outcome {
    Continue,
    Finished,
    Cancelled(&'static str),
}

#[derive(Debug, Clone, Default)]
pub struct EscortCoordinator {
    config: EscortConfig,
    /// Keyed by guard.
    sessions: BTreeMap<ActorId, EscortSession>,
}

impl EscortCoordinator {
    pub fn new(config: EscortConfig) -> Self {
        Self {
            config,
            sessions: BTreeMap::new(),
        }
    }

    pub fn session(&self, guard: ActorId) -> Option<&EscortSession> {
        self.sessions.get(&guard)
    }

    pub fn is_escorting(&self, guard: ActorId) -> bool {
        self.sessions.contains_key(&guard)
    }

    /// Guard currently escorting `prisoner`.
    pub fn escort_of(&self, prisoner: ActorId) -> Option<ActorId> {
        self.sessions
            .values()
            .find(|s| s.prisoner == prisoner)
            .map(|s| s.guard)
    }

    pub fn progress(&self, guard: ActorId) -> Option<f32> {
        self.sessions.get(&guard).map(EscortSession::progress)
    }

    pub fn active(&self) -> impl Iterator<Item = &EscortSession> {
        self.sessions.values()
    }

    /// Open a session. Opens a ledger escort context on success.
    pub fn start_escort(
        &mut self,
        guard: ActorId,
        prisoner: ActorId,
        stations: Vec<Station>,
        ledger: &mut DoorSecurityLedger,
        now: SimTime,
    ) -> Result<(), EscortRejected> {
        if guard == prisoner {
            return Err(EscortRejected::SelfEscort);
        }
        if stations.is_empty() {
            return Err(EscortRejected::EmptyRoute);
        }
        if self.is_escorting(guard) {
            return Err(EscortRejected::GuardBusy(guard));
        }
        if self.escort_of(prisoner).is_some() || self.is_escorting(prisoner) {
            return Err(EscortRejected::AlreadyEscorted(prisoner));
        }

        info!(
            "escort: {guard} takes {prisoner} through {} stations",
            stations.len()
        );
        ledger.begin_escort_context();
        self.sessions.insert(
            guard,
            EscortSession {
                guard,
                prisoner,
                stations,
                next: 0,
                completed: Vec::new(),
                step: EscortStep::Starting,
                started_at: now,
                far_since: None,
            },
        );
        Ok(())
    }

    /// Drop the session without undoing completed stations. Also stops the
    /// guard's door crossing if one is running for this escort.
    pub fn cancel_escort<W: JailWorld + ?Sized>(
        &mut self,
        guard: ActorId,
        world: &mut W,
        deps: &mut EscortDeps<'_>,
    ) -> bool {
        let Some(session) = self.sessions.remove(&guard) else {
            return false;
        };
        if session.step == EscortStep::Crossing {
            deps.doors.stop_operation(guard, world, deps.events);
        }
        world.stop(guard);
        self.close_session(session, false, deps);
        true
    }

    pub fn tick<W: JailWorld + ?Sized>(
        &mut self,
        world: &mut W,
        deps: &mut EscortDeps<'_>,
        now: SimTime,
    ) {
        let guards: Vec<ActorId> = self.sessions.keys().copied().collect();
        for guard in guards {
            let Some(mut session) = self.sessions.remove(&guard) else {
                continue;
            };
            match self.advance(&mut session, world, deps, now) {
                Outcome::Continue => {
                    self.sessions.insert(guard, session);
                }
                Outcome::Finished => self.close_session(session, true, deps),
                Outcome::Cancelled(why) => {
                    warn!("escort: {guard} with {} cancelled: {why}", session.prisoner);
                    if session.step == EscortStep::Crossing {
                        deps.doors.stop_operation(guard, world, deps.events);
                    }
                    self.close_session(session, false, deps);
                }
            }
        }
    }

    fn advance<W: JailWorld + ?Sized>(
        &self,
        session: &mut EscortSession,
        world: &mut W,
        deps: &mut EscortDeps<'_>,
        now: SimTime,
    ) -> Outcome {
        let Some(guard_pos) = world.position(session.guard) else {
            return Outcome::Cancelled("guard missing");
        };
        let Some(prisoner_pos) = world.position(session.prisoner) else {
            return Outcome::Cancelled("prisoner missing");
        };

        if session.step != EscortStep::Crossing {
            self.guide(session, guard_pos, prisoner_pos, world, deps.events, now);
        }

        let Some(station) = session.current_station().cloned() else {
            return Outcome::Finished;
        };

        match session.step.clone() {
            EscortStep::Starting => {
                if let Some(transition) = &station.transition {
                    match deps.doors.try_begin_transition(
                        session.guard,
                        transition,
                        Some(session.prisoner),
                        deps.registry,
                        world,
                        now,
                        deps.events,
                    ) {
                        Ok(()) => {
                            session.step = EscortStep::Crossing;
                            return Outcome::Continue;
                        }
                        Err(TransitionRejected::Registry(err)) => {
                            warn!("escort: {}: {err}; walking to {} directly", session.guard, station.name);
                        }
                        Err(busy) => {
                            debug!("escort: {} waiting to cross: {busy}", session.guard);
                            return Outcome::Continue;
                        }
                    }
                }
                self.head_for(session, &station, world);
            }
            EscortStep::Crossing => {
                if !deps.doors.is_busy(session.guard) {
                    self.head_for(session, &station, world);
                }
            }
            EscortStep::Moving { goal } => {
                if guard_pos.distance(&goal) <= STATION_ARRIVAL_RADIUS
                    || world.has_arrived(session.guard)
                {
                    debug!("escort: {} at {}", session.guard, station.name);
                    session.step = EscortStep::Waiting {
                        since: now,
                        still_for: 0.0,
                        last_sample: prisoner_pos,
                        sampled_at: now,
                    };
                } else if world.is_navigation_blocked(session.guard) {
                    self.renavigate(session, &station, world);
                }
            }
            EscortStep::Waiting {
                since,
                still_for,
                last_sample,
                sampled_at,
            } => {
                let near = prisoner_pos.distance(&station.anchor) <= self.config.check_radius;
                let still =
                    prisoner_pos.distance(&last_sample) < self.config.stationary_epsilon;
                let still_for = if near && still {
                    still_for + (now - sampled_at)
                } else {
                    0.0
                };

                if still_for >= station.dwell {
                    self.complete_station(session, &station, false, deps.events);
                } else if now - since >= self.config.station_timeout {
                    warn!(
                        "escort: {} gave up waiting for {} at {}",
                        session.guard, session.prisoner, station.name
                    );
                    self.complete_station(session, &station, true, deps.events);
                } else {
                    session.step = EscortStep::Waiting {
                        since,
                        still_for,
                        last_sample: prisoner_pos,
                        sampled_at: now,
                    };
                }

                if session.next >= session.stations.len() {
                    return Outcome::Finished;
                }
            }
        }
        Outcome::Continue
    }

    /// Prompt a prisoner who has been far from the guard for too long.
    fn guide<W: JailWorld + ?Sized>(
        &self,
        session: &mut EscortSession,
        guard_pos: Vec3,
        prisoner_pos: Vec3,
        world: &mut W,
        events: &mut Vec<FacilityEvent>,
        now: SimTime,
    ) {
        if guard_pos.distance(&prisoner_pos) <= self.config.far_distance {
            session.far_since = None;
            return;
        }
        let since = *session.far_since.get_or_insert(now);
        if now - since >= self.config.guidance_delay {
            world.send_transcript_message(session.prisoner, GUIDANCE_PROMPT, 3.0);
            events.push(FacilityEvent::GuidancePrompt {
                guard: session.guard,
                prisoner: session.prisoner,
            });
            session.far_since = Some(now);
        }
    }

    fn head_for<W: JailWorld + ?Sized>(
        &self,
        session: &mut EscortSession,
        station: &Station,
        world: &mut W,
    ) {
        if world.move_to(session.guard, station.anchor, 1.0) {
            session.step = EscortStep::Moving {
                goal: station.anchor,
            };
        } else {
            self.renavigate(session, station, world);
        }
    }

    /// Route to a walkable point near the anchor instead. Leaves the step
    /// unchanged (and retries next tick) when there is none.
    fn renavigate<W: JailWorld + ?Sized>(
        &self,
        session: &mut EscortSession,
        station: &Station,
        world: &mut W,
    ) {
        let Some(goal) =
            world.find_navigable_point_near(station.anchor, self.config.renavigate_radius)
        else {
            debug!("escort: no walkable point near {}", station.name);
            return;
        };
        debug!("escort: {} re-routing to {} via {goal:?}", session.guard, station.name);
        if world.move_to(session.guard, goal, 1.0) {
            session.step = EscortStep::Moving { goal };
        }
    }

    fn complete_station(
        &self,
        session: &mut EscortSession,
        station: &Station,
        timed_out: bool,
        events: &mut Vec<FacilityEvent>,
    ) {
        session.completed.push(station.name.clone());
        session.next += 1;
        session.step = EscortStep::Starting;
        info!(
            "escort: {} finished {} ({}/{})",
            session.prisoner,
            station.name,
            session.completed.len(),
            session.stations.len()
        );
        events.push(FacilityEvent::StationCompleted {
            guard: session.guard,
            prisoner: session.prisoner,
            station: station.name.clone(),
            completed: session.completed.len(),
            total: session.stations.len(),
            timed_out,
        });
    }

    fn close_session(&self, session: EscortSession, finished: bool, deps: &mut EscortDeps<'_>) {
        deps.ledger.end_escort_context();
        if finished {
            info!("escort: {} finished with {}", session.guard, session.prisoner);
            deps.events.push(FacilityEvent::EscortCompleted {
                guard: session.guard,
                prisoner: session.prisoner,
            });
        } else {
            deps.events.push(FacilityEvent::EscortCancelled {
                guard: session.guard,
                prisoner: session.prisoner,
                completed: session.completed.len(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DoorTimings, LedgerConfig};
    use crate::door_ops::DoorPhase;
    use crate::ports::{DoorPort, NavigationPort};
    use crate::registry::{naming_table, SceneCatalog};
    use crate::testing::FakeWorld;

    const GUARD: ActorId = 1;
    const PRISONER: ActorId = 2;
    const DT: f64 = 0.1;

    struct Rig {
        escorts: EscortCoordinator,
        doors: DoorTransitionEngine,
        registry: DoorRegistry,
        ledger: DoorSecurityLedger,
        world: FakeWorld,
        events: Vec<FacilityEvent>,
        now: SimTime,
    }

    impl Rig {
        fn new() -> Self {
            let mut scene = SceneCatalog::new();
            scene.add_point("Booking_Outside", Vec3::new(0.0, -2.0, 0.0));
            scene.add_point("Booking_Inside", Vec3::new(0.0, 1.0, 0.0));
            scene.add_door("BookingDoor");
            let registry = DoorRegistry::build(&naming_table(0), &scene, 0.5);
            let ledger =
                DoorSecurityLedger::new(registry.door_classes().clone(), LedgerConfig::default());

            let mut world = FakeWorld::new();
            world.add_door("BookingDoor", true);
            world.add_guard(GUARD, Vec3::ZERO, 2.0);
            world.add_actor(PRISONER, Vec3::new(-1.0, 0.0, 0.0), 2.0);

            Self {
                escorts: EscortCoordinator::new(EscortConfig::default()),
                doors: DoorTransitionEngine::new(DoorTimings::default()),
                registry,
                ledger,
                world,
                events: Vec::new(),
                now: 0.0,
            }
        }

        fn start(&mut self, stations: Vec<Station>) -> Result<(), EscortRejected> {
            self.escorts
                .start_escort(GUARD, PRISONER, stations, &mut self.ledger, self.now)
        }

        /// Tick; the prisoner trails the guard when `follow` is set.
        fn run(&mut self, seconds: f64, follow: bool) {
            let steps = (seconds / DT).round() as usize;
            for _ in 0..steps {
                self.now += DT;
                if follow {
                    let guard = self.world.actor(GUARD).position;
                    let target = guard + Vec3::new(-0.5, 0.0, 0.0);
                    if self.world.actor(PRISONER).position.distance(&target) > 0.05 {
                        self.world.move_to(PRISONER, target, 1.0);
                    }
                }
                self.world.step(DT as f32);
                self.doors
                    .tick(&mut self.world, &mut self.ledger, self.now, &mut self.events);
                let mut deps = EscortDeps {
                    doors: &mut self.doors,
                    registry: &self.registry,
                    ledger: &mut self.ledger,
                    events: &mut self.events,
                };
                self.escorts.tick(&mut self.world, &mut deps, self.now);
            }
        }

        fn cancel(&mut self) -> bool {
            let mut deps = EscortDeps {
                doors: &mut self.doors,
                registry: &self.registry,
                ledger: &mut self.ledger,
                events: &mut self.events,
            };
            self.escorts.cancel_escort(GUARD, &mut self.world, &mut deps)
        }

        fn stations_completed(&self) -> Vec<(String, bool)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    FacilityEvent::StationCompleted {
                        station, timed_out, ..
                    } => Some((station.clone(), *timed_out)),
                    _ => None,
                })
                .collect()
        }
    }

    fn route() -> Vec<Station> {
        booking_stations(
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        )
    }

    #[test]
    fn rejects_bad_requests() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.escorts
                .start_escort(GUARD, GUARD, route(), &mut rig.ledger, 0.0),
            Err(EscortRejected::SelfEscort)
        );
        assert_eq!(rig.start(vec![]), Err(EscortRejected::EmptyRoute));
        assert_eq!(rig.start(route()), Ok(()));
        assert_eq!(rig.start(route()), Err(EscortRejected::GuardBusy(GUARD)));
        assert_eq!(
            rig.escorts.start_escort(3, PRISONER, route(), &mut rig.ledger, 0.0),
            Err(EscortRejected::AlreadyEscorted(PRISONER))
        );
        assert!(rig.ledger.escort_active());
    }

    #[test]
    fn following_prisoner_completes_stations_in_order() {
        let mut rig = Rig::new();
        rig.start(route()).unwrap();

        rig.run(12.5, true);
        assert_eq!(
            rig.stations_completed(),
            vec![(MUGSHOT.to_string(), false), (FINGERPRINT.to_string(), false)]
        );
        assert!((rig.escorts.progress(GUARD).unwrap() - 2.0 / 3.0).abs() < 1e-6);

        rig.run(10.0, true);
        assert_eq!(rig.stations_completed().len(), 3);
        assert!(!rig.escorts.is_escorting(GUARD));
        assert!(rig
            .events
            .iter()
            .any(|e| matches!(e, FacilityEvent::EscortCompleted { guard: GUARD, .. })));
        assert!(!rig.ledger.escort_active());
    }

    #[test]
    fn stalled_prisoner_times_out_station_and_gets_guidance() {
        let mut rig = Rig::new();
        rig.world.warp(PRISONER, Vec3::new(-6.0, 0.0, 0.0));
        rig.start(route()).unwrap();

        rig.run(33.0, false);
        assert_eq!(rig.stations_completed(), vec![(MUGSHOT.to_string(), true)]);
        let prompts = rig
            .events
            .iter()
            .filter(|e| matches!(e, FacilityEvent::GuidancePrompt { .. }))
            .count();
        assert_eq!(prompts, 3);
        assert!(rig.world.messages.iter().all(|(a, _)| *a == PRISONER));
    }

    #[test]
    fn blocked_route_is_recomputed() {
        let mut rig = Rig::new();
        rig.start(route()).unwrap();
        rig.run(0.1, false);
        rig.world.block(GUARD, 1);

        rig.run(0.1, false);
        let step = rig.escorts.session(GUARD).unwrap().step.clone();
        assert_eq!(
            step,
            EscortStep::Moving {
                goal: Vec3::new(4.25, 0.0, 0.0)
            }
        );
        assert!(!rig.world.actor(GUARD).blocked);
    }

    #[test]
    fn station_door_is_crossed_with_prisoner() {
        let mut rig = Rig::new();
        let stations =
            vec![Station::new(MUGSHOT, Vec3::new(0.0, 5.0, 0.0), 1.0).through("BookingEnter")];
        rig.world.warp(GUARD, Vec3::new(0.0, -2.0, 0.0));
        rig.world.warp(PRISONER, Vec3::new(0.0, -3.0, 0.0));
        rig.start(stations).unwrap();

        rig.run(0.1, false);
        assert_eq!(rig.escorts.session(GUARD).unwrap().step, EscortStep::Crossing);
        assert_eq!(rig.doors.operation(GUARD).unwrap().escorted, Some(PRISONER));

        rig.run(2.0, false);
        assert_eq!(rig.doors.phase(GUARD), DoorPhase::WaitingForEscort);
        rig.world.warp(PRISONER, Vec3::new(0.0, 1.5, 0.0));
        rig.run(4.0, false);
        assert!(rig.world.is_closed("BookingDoor"));
        assert!(rig.world.is_locked("BookingDoor"));

        rig.world.warp(PRISONER, Vec3::new(0.0, 5.5, 0.0));
        rig.run(4.0, false);
        assert_eq!(rig.stations_completed(), vec![(MUGSHOT.to_string(), false)]);
        assert!(!rig.escorts.is_escorting(GUARD));
    }

    #[test]
    fn cancel_keeps_completed_stations_and_stops_crossing() {
        let mut rig = Rig::new();
        let stations = vec![
            Station::new(MUGSHOT, Vec3::new(0.0, -2.0, 0.0), 0.5),
            Station::new(FINGERPRINT, Vec3::new(0.0, 3.0, 0.0), 1.0).through("BookingEnter"),
        ];
        rig.start(stations).unwrap();
        rig.world.warp(PRISONER, Vec3::new(0.0, -2.5, 0.0));

        rig.run(3.0, false);
        assert_eq!(rig.stations_completed().len(), 1);
        assert!(rig.doors.is_busy(GUARD));

        assert!(rig.cancel());
        assert!(!rig.cancel());
        assert!(!rig.doors.is_busy(GUARD));
        assert!(rig.events.iter().any(|e| matches!(
            e,
            FacilityEvent::EscortCancelled { completed: 1, .. }
        )));
        assert!(!rig.ledger.escort_active());
    }
}
