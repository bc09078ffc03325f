//! Door transition engine: drives one actor through one door crossing.
//!
//! ```text
//! MovingToEntry → SecurityCheckEntry → Opening → [WaitingForEscort]
//!     → MovingToExit → SecurityCheckExit → Closing → Complete
//! ```
//!
//! Each actor has at most one operation in flight, and each door has at most
//! one operator: the engine hands out a per-door token on acceptance and takes
//! it back on completion, abort or stop. Phases are advanced cooperatively
//! from [`DoorTransitionEngine::tick`]; every wait is either a fixed pause, a
//! navigation wait bounded by the timeout, or the unbounded escort wait.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::DoorTimings;
use crate::error::TransitionRejected;
use crate::events::{AbortReason, FacilityEvent};
use crate::geometry::{is_past, Vec3};
use crate::ledger::DoorSecurityLedger;
use crate::ports::{JailWorld, NavigationPort};
use crate::registry::{DoorRegistry, DoorTransition};
use crate::{ActorId, SimTime};

const ESCORT_REMINDER: &str = "Keep moving. Through the door.";

/// Phase of a single crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorPhase {
    Idle,
    MovingToEntry,
    SecurityCheckEntry,
    Opening,
    WaitingForEscort,
    MovingToExit,
    SecurityCheckExit,
    Closing,
    Complete,
}

impl DoorPhase {
    /// Idle and Complete do not block a new request.
    pub fn is_in_flight(&self) -> bool {
        !matches!(self, DoorPhase::Idle | DoorPhase::Complete)
    }
}

/// An accepted crossing in progress.
#[derive(Debug, Clone)]
pub struct DoorOperation {
    pub actor: ActorId,
    pub transition: DoorTransition,
    pub escorted: Option<ActorId>,
    pub phase: DoorPhase,
    pub phase_started: SimTime,
    pub started_at: SimTime,
    next_reminder: SimTime,
}

enum Step {
    Stay,
    Next(DoorPhase),
    Finish,
    Abort(AbortReason),
}

#[derive(Debug, Clone, Default)]
pub struct DoorTransitionEngine {
    timings: DoorTimings,
    operations: BTreeMap<ActorId, DoorOperation>,
    door_tokens: HashMap<String, ActorId>,
}

impl DoorTransitionEngine {
    pub fn new(timings: DoorTimings) -> Self {
        Self {
            timings,
            operations: BTreeMap::new(),
            door_tokens: HashMap::new(),
        }
    }

    pub fn phase(&self, actor: ActorId) -> DoorPhase {
        self.operations
            .get(&actor)
            .map_or(DoorPhase::Idle, |op| op.phase)
    }

    pub fn is_busy(&self, actor: ActorId) -> bool {
        self.phase(actor).is_in_flight()
    }

    pub fn operation(&self, actor: ActorId) -> Option<&DoorOperation> {
        self.operations.get(&actor)
    }

    /// Actor currently holding `door`, if any.
    pub fn door_holder(&self, door: &str) -> Option<ActorId> {
        self.door_tokens.get(door).copied()
    }

    /// Boolean form of [`Self::try_begin_transition`].
    #[allow(clippy::too_many_arguments)]
    pub fn begin_transition<W: NavigationPort + ?Sized>(
        &mut self,
        actor: ActorId,
        transition_id: &str,
        escorted: Option<ActorId>,
        registry: &DoorRegistry,
        world: &mut W,
        now: SimTime,
        events: &mut Vec<FacilityEvent>,
    ) -> bool {
        match self.try_begin_transition(actor, transition_id, escorted, registry, world, now, events) {
            Ok(()) => true,
            Err(err) => {
                debug!("doors: rejected {transition_id} for {actor}: {err}");
                false
            }
        }
    }

    /// Accept a crossing for `actor`, or say why not. A rejection leaves all
    /// state untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn try_begin_transition<W: NavigationPort + ?Sized>(
        &mut self,
        actor: ActorId,
        transition_id: &str,
        escorted: Option<ActorId>,
        registry: &DoorRegistry,
        world: &mut W,
        now: SimTime,
        events: &mut Vec<FacilityEvent>,
    ) -> Result<(), TransitionRejected> {
        if self.is_busy(actor) {
            return Err(TransitionRejected::ActorBusy(actor));
        }
        let transition = registry.resolve(transition_id)?.clone();
        if let Some(holder) = self.door_holder(&transition.door) {
            if holder != actor {
                return Err(TransitionRejected::DoorBusy {
                    door: transition.door,
                    holder,
                });
            }
        }

        info!(
            "doors: {actor} begins {transition_id}{}",
            escorted.map(|e| format!(" escorting {e}")).unwrap_or_default()
        );
        self.door_tokens.insert(transition.door.clone(), actor);
        let mut op = DoorOperation {
            actor,
            transition,
            escorted: escorted.filter(|e| *e != actor),
            phase: DoorPhase::Idle,
            phase_started: now,
            started_at: now,
            next_reminder: now,
        };

        if world.move_to(actor, op.transition.entry_point, 1.0) {
            set_phase(&mut op, DoorPhase::MovingToEntry, now, events);
            self.operations.insert(actor, op);
        } else {
            self.finish_aborted(op, AbortReason::NavigationRefused, events);
        }
        Ok(())
    }

    /// Cancel `actor`'s crossing. No undo: an opened door stays open for the
    /// ledger to recover.
    pub fn stop_operation<W: NavigationPort + ?Sized>(
        &mut self,
        actor: ActorId,
        world: &mut W,
        events: &mut Vec<FacilityEvent>,
    ) -> bool {
        let Some(op) = self.operations.remove(&actor) else {
            return false;
        };
        self.release(&op);
        world.stop(actor);
        info!("doors: {actor} stopped {} in {:?}", op.transition.id, op.phase);
        events.push(FacilityEvent::OperationStopped {
            actor,
            transition: op.transition.id,
            phase: op.phase,
        });
        true
    }

    /// Advance every operation by one tick.
    pub fn tick<W: JailWorld + ?Sized>(
        &mut self,
        world: &mut W,
        ledger: &mut DoorSecurityLedger,
        now: SimTime,
        events: &mut Vec<FacilityEvent>,
    ) {
        let actors: Vec<ActorId> = self.operations.keys().copied().collect();
        for actor in actors {
            let Some(mut op) = self.operations.remove(&actor) else {
                continue;
            };

            // Zero-length pauses chain within one tick; bounded by the phase count.
            let mut outcome = None;
            for _ in 0..9 {
                match self.advance(&mut op, world, ledger, now, events) {
                    Step::Stay => break,
                    Step::Next(phase) => {
                        if let Err(reason) = self.enter(&mut op, phase, world, ledger, now) {
                            outcome = Some(Err(reason));
                            break;
                        }
                        set_phase(&mut op, phase, now, events);
                    }
                    Step::Finish => {
                        outcome = Some(Ok(()));
                        break;
                    }
                    Step::Abort(reason) => {
                        outcome = Some(Err(reason));
                        break;
                    }
                }
            }

            match outcome {
                None => {
                    self.operations.insert(actor, op);
                }
                Some(Ok(())) => {
                    self.release(&op);
                    info!(
                        "doors: {actor} completed {} in {:.1}s",
                        op.transition.id,
                        now - op.started_at
                    );
                    events.push(FacilityEvent::TransitionCompleted {
                        actor,
                        transition: op.transition.id,
                        at: now,
                    });
                }
                Some(Err(reason)) => self.finish_aborted(op, reason, events),
            }
        }
    }

    fn advance<W: JailWorld + ?Sized>(
        &self,
        op: &mut DoorOperation,
        world: &mut W,
        ledger: &mut DoorSecurityLedger,
        now: SimTime,
        events: &mut Vec<FacilityEvent>,
    ) -> Step {
        let Some(position) = world.position(op.actor) else {
            return Step::Abort(AbortReason::ActorMissing);
        };
        let elapsed = now - op.phase_started;
        let t = &self.timings;

        match op.phase {
            DoorPhase::Idle => Step::Next(DoorPhase::MovingToEntry),
            DoorPhase::MovingToEntry => {
                self.await_arrival(op, position, op.transition.entry_point, elapsed, world, events)
                    .unwrap_or(Step::Next(DoorPhase::SecurityCheckEntry))
            }
            DoorPhase::SecurityCheckEntry => {
                if elapsed >= op.transition.security_delay {
                    Step::Next(DoorPhase::Opening)
                } else {
                    Step::Stay
                }
            }
            DoorPhase::Opening => {
                if elapsed < t.open_duration {
                    Step::Stay
                } else if op.escorted.is_some() {
                    Step::Next(DoorPhase::WaitingForEscort)
                } else {
                    Step::Next(DoorPhase::MovingToExit)
                }
            }
            DoorPhase::WaitingForEscort => {
                let Some(escorted) = op.escorted else {
                    return Step::Next(DoorPhase::MovingToExit);
                };
                let Some(escorted_pos) = world.position(escorted) else {
                    return Step::Abort(AbortReason::EscortedActorMissing);
                };
                let exit = op.transition.exit_point;
                if escorted_pos.distance(&exit) <= t.escort_pass_distance
                    || is_past(&escorted_pos, &exit, &op.transition.exit_forward)
                {
                    return Step::Next(DoorPhase::MovingToExit);
                }
                if now >= op.next_reminder {
                    world.send_transcript_message(escorted, ESCORT_REMINDER, 3.0);
                    events.push(FacilityEvent::EscortReminder {
                        actor: op.actor,
                        escorted,
                        transition: op.transition.id.clone(),
                    });
                    op.next_reminder += t.escort_reminder_interval;
                    if op.next_reminder <= now {
                        op.next_reminder = now + t.escort_reminder_interval;
                    }
                }
                Step::Stay
            }
            DoorPhase::MovingToExit => {
                self.await_arrival(op, position, op.transition.exit_point, elapsed, world, events)
                    .unwrap_or(Step::Next(DoorPhase::SecurityCheckExit))
            }
            DoorPhase::SecurityCheckExit => {
                if elapsed >= op.transition.security_delay {
                    Step::Next(DoorPhase::Closing)
                } else {
                    Step::Stay
                }
            }
            DoorPhase::Closing => {
                if elapsed >= t.pre_close_delay {
                    ledger.secure(&op.transition.door, world);
                    Step::Next(DoorPhase::Complete)
                } else {
                    Step::Stay
                }
            }
            DoorPhase::Complete => Step::Finish,
        }
    }

    /// `Some(Stay)` while still walking, `None` once arrived or timed out.
    fn await_arrival<W: JailWorld + ?Sized>(
        &self,
        op: &DoorOperation,
        position: Vec3,
        target: Vec3,
        elapsed: f64,
        world: &W,
        events: &mut Vec<FacilityEvent>,
    ) -> Option<Step> {
        let arrived = position.distance(&target) <= self.timings.arrival_tolerance
            || world.has_arrived(op.actor);
        if arrived {
            return None;
        }
        if elapsed >= self.timings.navigation_timeout {
            warn!(
                "doors: {} timed out in {:?} on {} ({:.1} left), proceeding",
                op.actor,
                op.phase,
                op.transition.id,
                world.remaining_distance(op.actor)
            );
            events.push(FacilityEvent::NavigationTimeout {
                actor: op.actor,
                transition: op.transition.id.clone(),
                phase: op.phase,
            });
            return None;
        }
        Some(Step::Stay)
    }

    /// Side effects of entering `phase`.
    fn enter<W: JailWorld + ?Sized>(
        &self,
        op: &mut DoorOperation,
        phase: DoorPhase,
        world: &mut W,
        ledger: &mut DoorSecurityLedger,
        now: SimTime,
    ) -> Result<(), AbortReason> {
        let door = op.transition.door.as_str();
        match phase {
            DoorPhase::MovingToEntry => {
                if !world.move_to(op.actor, op.transition.entry_point, 1.0) {
                    return Err(AbortReason::NavigationRefused);
                }
            }
            DoorPhase::Opening => {
                if world.is_locked(door) {
                    world.unlock(door);
                }
                world.open(door);
                ledger.register_interaction(door, op.actor, true, now);
            }
            DoorPhase::WaitingForEscort => {
                op.next_reminder = now + self.timings.escort_reminder_interval;
            }
            DoorPhase::MovingToExit => {
                if !world.move_to(op.actor, op.transition.exit_point, 1.0) {
                    return Err(AbortReason::NavigationRefused);
                }
            }
            DoorPhase::SecurityCheckExit => {
                ledger.register_passage(door, op.actor);
            }
            DoorPhase::Idle
            | DoorPhase::SecurityCheckEntry
            | DoorPhase::Closing
            | DoorPhase::Complete => {}
        }
        Ok(())
    }

    fn release(&mut self, op: &DoorOperation) {
        if self.door_tokens.get(&op.transition.door) == Some(&op.actor) {
            self.door_tokens.remove(&op.transition.door);
        }
    }

    fn finish_aborted(
        &mut self,
        op: DoorOperation,
        reason: AbortReason,
        events: &mut Vec<FacilityEvent>,
    ) {
        self.release(&op);
        warn!(
            "doors: {} aborted {} in {:?}: {:?}",
            op.actor, op.transition.id, op.phase, reason
        );
        events.push(FacilityEvent::TransitionFailed {
            actor: op.actor,
            transition: op.transition.id,
            phase: op.phase,
            reason,
        });
    }
}

fn set_phase(op: &mut DoorOperation, phase: DoorPhase, now: SimTime, events: &mut Vec<FacilityEvent>) {
    debug!("doors: {} {:?} → {:?} ({})", op.actor, op.phase, phase, op.transition.id);
    op.phase = phase;
    op.phase_started = now;
    events.push(FacilityEvent::PhaseEntered {
        actor: op.actor,
        transition: op.transition.id.clone(),
        phase,
        at: now,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::ports::DoorPort;
    use crate::registry::{cell_door, cell_points, naming_table, SceneCatalog};
    use crate::testing::FakeWorld;

    const GUARD: ActorId = 1;
    const PRISONER: ActorId = 2;
    const OTHER_GUARD: ActorId = 3;
    const DT: f64 = 0.1;

    struct Rig {
        engine: DoorTransitionEngine,
        registry: DoorRegistry,
        ledger: DoorSecurityLedger,
        world: FakeWorld,
        events: Vec<FacilityEvent>,
        now: SimTime,
    }

    impl Rig {
        fn new() -> Self {
            let mut scene = SceneCatalog::new();
            let mut world = FakeWorld::new();
            for i in 0..4 {
                let (outside, inside) = cell_points(i);
                scene.add_point(outside, Vec3::new(i as f32 * 4.0, 0.0, 0.0));
                scene.add_point(inside, Vec3::new(i as f32 * 4.0, 3.0, 0.0));
                scene.add_door(cell_door(i));
                world.add_door(&cell_door(i), true);
            }
            let registry = DoorRegistry::build(&naming_table(4), &scene, 0.5);
            let ledger =
                DoorSecurityLedger::new(registry.door_classes().clone(), LedgerConfig::default());
            Self {
                engine: DoorTransitionEngine::new(DoorTimings::default()),
                registry,
                ledger,
                world,
                events: Vec::new(),
                now: 0.0,
            }
        }

        fn begin(&mut self, actor: ActorId, id: &str, escorted: Option<ActorId>) -> bool {
            self.engine.begin_transition(
                actor,
                id,
                escorted,
                &self.registry,
                &mut self.world,
                self.now,
                &mut self.events,
            )
        }

        fn run(&mut self, seconds: f64) {
            let steps = (seconds / DT).round() as usize;
            for _ in 0..steps {
                self.now += DT;
                self.world.step(DT as f32);
                self.engine
                    .tick(&mut self.world, &mut self.ledger, self.now, &mut self.events);
            }
        }

        fn phases(&self, actor: ActorId) -> Vec<DoorPhase> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    FacilityEvent::PhaseEntered { actor: a, phase, .. } if *a == actor => {
                        Some(*phase)
                    }
                    _ => None,
                })
                .collect()
        }

        fn count(&self, pred: impl Fn(&FacilityEvent) -> bool) -> usize {
            self.events.iter().filter(|e| pred(e)).count()
        }
    }

    #[test]
    fn cell_door_runs_every_phase_and_ends_closed() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, 0.0, 0.0), 2.0);

        assert!(rig.begin(GUARD, "CellDoor_3", None));
        rig.run(10.0);

        assert_eq!(
            rig.phases(GUARD),
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
        assert!(rig.world.is_closed("Cell_3_Door"));
        assert!(rig.world.is_locked("Cell_3_Door"));
        assert_eq!(rig.engine.phase(GUARD), DoorPhase::Idle);
        assert_eq!(rig.engine.door_holder("Cell_3_Door"), None);

        // 0.5 check + 1.0 open + 1.5 walk + 0.5 check + 0.5 pre-close ≈ 4.0s
        let done_at = rig
            .events
            .iter()
            .find_map(|e| match e {
                FacilityEvent::TransitionCompleted { at, .. } => Some(*at),
                _ => None,
            })
            .unwrap();
        assert!((done_at - 4.0).abs() < 0.35, "completed at {done_at}");
    }

    #[test]
    fn second_request_on_busy_actor_is_rejected() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, 0.0, 0.0), 2.0);

        assert!(rig.begin(GUARD, "CellDoor_3", None));
        rig.run(0.3);
        let err = rig.engine.try_begin_transition(
            GUARD,
            "CellDoor_1",
            None,
            &rig.registry,
            &mut rig.world,
            rig.now,
            &mut rig.events,
        );
        assert_eq!(err, Err(TransitionRejected::ActorBusy(GUARD)));
        assert_eq!(rig.engine.operation(GUARD).unwrap().transition.id, "CellDoor_3");

        rig.run(10.0);
        assert_eq!(rig.phases(GUARD).len(), 7);
        assert!(rig.world.is_closed("Cell_1_Door"));
    }

    #[test]
    fn second_actor_on_held_door_is_rejected() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, 0.0, 0.0), 2.0);
        rig.world.add_guard(OTHER_GUARD, Vec3::new(12.0, 3.0, 0.0), 2.0);

        assert!(rig.begin(GUARD, "CellDoor_3", None));
        let err = rig.engine.try_begin_transition(
            OTHER_GUARD,
            "CellDoorExit_3",
            None,
            &rig.registry,
            &mut rig.world,
            rig.now,
            &mut rig.events,
        );
        assert_eq!(
            err,
            Err(TransitionRejected::DoorBusy {
                door: "Cell_3_Door".into(),
                holder: GUARD
            })
        );

        rig.run(10.0);
        assert!(rig.begin(OTHER_GUARD, "CellDoorExit_3", None));
    }

    #[test]
    fn unknown_transition_is_rejected() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::ZERO, 2.0);
        assert!(!rig.begin(GUARD, "CellDoor_9", None));
        assert!(!rig.begin(GUARD, "BookingEnter", None));
        assert!(rig.events.is_empty());
    }

    #[test]
    fn navigation_timeout_proceeds_anyway() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, -30.0, 0.0), 0.5);

        assert!(rig.begin(GUARD, "CellDoor_3", None));
        rig.run(16.0);

        assert_eq!(
            rig.count(|e| matches!(
                e,
                FacilityEvent::NavigationTimeout { phase: DoorPhase::MovingToEntry, .. }
            )),
            1
        );
        assert!(rig.phases(GUARD).contains(&DoorPhase::Opening));
    }

    #[test]
    fn escort_wait_reminds_until_stopped() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, 0.0, 0.0), 2.0);
        // Prisoner stands behind the guard and never moves.
        rig.world.add_actor(PRISONER, Vec3::new(12.0, -2.0, 0.0), 1.0);

        assert!(rig.begin(GUARD, "CellDoor_3", Some(PRISONER)));
        rig.run(2.0);
        assert_eq!(rig.engine.phase(GUARD), DoorPhase::WaitingForEscort);

        rig.run(21.0);
        assert_eq!(rig.engine.phase(GUARD), DoorPhase::WaitingForEscort);
        let reminders = rig.count(|e| matches!(e, FacilityEvent::EscortReminder { .. }));
        assert_eq!(reminders, 4);
        assert_eq!(rig.world.messages.len(), 4);
        assert!(rig.world.messages.iter().all(|(a, _)| *a == PRISONER));

        assert!(rig.engine.stop_operation(GUARD, &mut rig.world, &mut rig.events));
        assert_eq!(rig.engine.phase(GUARD), DoorPhase::Idle);
        rig.run(20.0);
        assert_eq!(
            rig.count(|e| matches!(e, FacilityEvent::EscortReminder { .. })),
            reminders
        );
        // No undo: the door stays open for the ledger.
        assert!(!rig.world.is_closed("Cell_3_Door"));
    }

    #[test]
    fn escort_proceeds_once_prisoner_is_through() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, 0.0, 0.0), 2.0);
        rig.world.add_actor(PRISONER, Vec3::new(12.0, -1.0, 0.0), 1.0);

        assert!(rig.begin(GUARD, "CellDoor_3", Some(PRISONER)));
        rig.run(2.0);
        assert_eq!(rig.engine.phase(GUARD), DoorPhase::WaitingForEscort);

        rig.world.warp(PRISONER, Vec3::new(12.0, 4.5, 0.0));
        rig.run(10.0);
        assert!(rig
            .count(|e| matches!(e, FacilityEvent::TransitionCompleted { actor: GUARD, .. }))
            == 1);
        assert!(rig.world.is_closed("Cell_3_Door"));
    }

    #[test]
    fn missing_escorted_actor_aborts_with_phase() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, 0.0, 0.0), 2.0);
        rig.world.add_actor(PRISONER, Vec3::new(12.0, -1.0, 0.0), 1.0);

        assert!(rig.begin(GUARD, "CellDoor_3", Some(PRISONER)));
        rig.run(2.0);
        rig.world.remove_actor(PRISONER);
        rig.run(0.2);

        assert!(rig.events.iter().any(|e| matches!(
            e,
            FacilityEvent::TransitionFailed {
                phase: DoorPhase::WaitingForEscort,
                reason: AbortReason::EscortedActorMissing,
                ..
            }
        )));
        assert_eq!(rig.engine.phase(GUARD), DoorPhase::Idle);
        assert_eq!(rig.engine.door_holder("Cell_3_Door"), None);
        assert!(!rig.world.is_closed("Cell_3_Door"));
    }

    #[test]
    fn refused_navigation_aborts_immediately() {
        let mut rig = Rig::new();
        rig.world.add_guard(GUARD, Vec3::new(12.0, 0.0, 0.0), 2.0);
        rig.world.refuse_moves = true;

        assert!(rig.begin(GUARD, "CellDoor_3", None));
        assert_eq!(rig.engine.phase(GUARD), DoorPhase::Idle);
        assert!(matches!(
            rig.events.last(),
            Some(FacilityEvent::TransitionFailed {
                reason: AbortReason::NavigationRefused,
                ..
            })
        ));
    }
}
