//! The facility context: one jail's registry, door engine, ledger, guards and
//! escorts, advanced together from a single tick.
//!
//! Nothing here is global. Build one [`Facility`] per world (tests build many)
//! and pass the host world into every call that needs it.
//!
//! # Tick order
//!
//! 1. Breach check, every `ledger.breach_check_interval` seconds
//! 2. Door operations
//! 3. Escorts
//! 4. Guards not busy with a door or an escort, then their door requests

use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::FacilityConfig;
use crate::door_ops::DoorTransitionEngine;
use crate::error::{EscortRejected, TransitionRejected};
use crate::escort::{EscortCoordinator, EscortDeps, Station};
use crate::events::FacilityEvent;
use crate::guard::{GuardBrain, GuardCtx, PatrolPoint};
use crate::ledger::DoorSecurityLedger;
use crate::ports::JailWorld;
use crate::registry::{naming_table, DoorRegistry, SceneCatalog};
use crate::{ActorId, SimTime};

#[derive(Debug, Clone)]
pub struct Facility {
    config: FacilityConfig,
    registry: DoorRegistry,
    doors: DoorTransitionEngine,
    ledger: DoorSecurityLedger,
    escorts: EscortCoordinator,
    guards: BTreeMap<ActorId, GuardBrain>,
    events: Vec<FacilityEvent>,
    last_breach_check: SimTime,
}

impl Facility {
    /// Resolve the naming table against `scene` and set up empty subsystems.
    pub fn new(config: FacilityConfig, scene: &SceneCatalog) -> Self {
        let registry = DoorRegistry::build(
            &naming_table(config.cell_count),
            scene,
            config.doors.security_pause,
        );
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: FacilityConfig, registry: DoorRegistry) -> Self {
        info!(
            "facility: {} transitions usable, {} disabled",
            registry.len(),
            registry.unusable().count()
        );
        let ledger = DoorSecurityLedger::new(registry.door_classes().clone(), config.ledger.clone());
        Self {
            doors: DoorTransitionEngine::new(config.doors.clone()),
            escorts: EscortCoordinator::new(config.escort.clone()),
            ledger,
            registry,
            guards: BTreeMap::new(),
            events: Vec::new(),
            last_breach_check: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &FacilityConfig {
        &self.config
    }

    pub fn registry(&self) -> &DoorRegistry {
        &self.registry
    }

    pub fn doors(&self) -> &DoorTransitionEngine {
        &self.doors
    }

    pub fn ledger(&self) -> &DoorSecurityLedger {
        &self.ledger
    }

    pub fn escorts(&self) -> &EscortCoordinator {
        &self.escorts
    }

    pub fn guard(&self, id: ActorId) -> Option<&GuardBrain> {
        self.guards.get(&id)
    }

    pub fn guards(&self) -> impl Iterator<Item = &GuardBrain> {
        self.guards.values()
    }

    // ── Guards ──

    pub fn add_guard(&mut self, id: ActorId, route: Vec<PatrolPoint>, now: SimTime) {
        debug!("facility: guard {id} on duty with {} patrol points", route.len());
        self.guards.insert(id, GuardBrain::new(id, route, now));
    }

    /// Drop a guard and everything it was driving.
    pub fn remove_guard<W: JailWorld + ?Sized>(&mut self, world: &mut W, id: ActorId) -> bool {
        self.cancel_escort(world, id);
        self.stop_operation(world, id);
        self.guards.remove(&id).is_some()
    }

    /// Order `guard` to search `target`. Refused while the guard is crossing a
    /// door or escorting.
    pub fn request_search<W: JailWorld + ?Sized>(
        &mut self,
        world: &mut W,
        guard: ActorId,
        target: ActorId,
        now: SimTime,
    ) -> bool {
        if self.is_busy(guard) {
            debug!("facility: guard {guard} busy, search on {target} refused");
            return false;
        }
        let Some(brain) = self.guards.get_mut(&guard) else {
            return false;
        };
        let mut ctx = GuardCtx {
            world,
            config: &self.config.guard,
            now,
            events: &mut self.events,
        };
        brain.request_search(target, &mut ctx)
    }

    /// Door operation or escort in progress.
    pub fn is_busy(&self, actor: ActorId) -> bool {
        self.doors.is_busy(actor) || self.escorts.is_escorting(actor)
    }

    // ── Doors ──

    pub fn begin_transition<W: JailWorld + ?Sized>(
        &mut self,
        world: &mut W,
        actor: ActorId,
        transition_id: &str,
        escorted: Option<ActorId>,
        now: SimTime,
    ) -> bool {
        self.try_begin_transition(world, actor, transition_id, escorted, now)
            .is_ok()
    }

    pub fn try_begin_transition<W: JailWorld + ?Sized>(
        &mut self,
        world: &mut W,
        actor: ActorId,
        transition_id: &str,
        escorted: Option<ActorId>,
        now: SimTime,
    ) -> Result<(), TransitionRejected> {
        self.doors.try_begin_transition(
            actor,
            transition_id,
            escorted,
            &self.registry,
            world,
            now,
            &mut self.events,
        )
    }

    pub fn stop_operation<W: JailWorld + ?Sized>(&mut self, world: &mut W, actor: ActorId) -> bool {
        self.doors.stop_operation(actor, world, &mut self.events)
    }

    /// Close and lock every always-secure door and every door still owed a
    /// re-secure.
    pub fn secure_all<W: JailWorld + ?Sized>(&mut self, world: &mut W) -> usize {
        self.ledger.secure_all(world)
    }

    // ── Escorts ──

    pub fn start_escort(
        &mut self,
        guard: ActorId,
        prisoner: ActorId,
        stations: Vec<Station>,
        now: SimTime,
    ) -> Result<(), EscortRejected> {
        if self.doors.is_busy(guard) {
            return Err(EscortRejected::GuardBusy(guard));
        }
        if self.is_busy(prisoner) {
            return Err(EscortRejected::AlreadyEscorted(prisoner));
        }
        self.escorts
            .start_escort(guard, prisoner, stations, &mut self.ledger, now)?;
        if let Some(brain) = self.guards.get_mut(&guard) {
            brain.suspend();
        }
        Ok(())
    }

    pub fn cancel_escort<W: JailWorld + ?Sized>(&mut self, world: &mut W, guard: ActorId) -> bool {
        let mut deps = EscortDeps {
            doors: &mut self.doors,
            registry: &self.registry,
            ledger: &mut self.ledger,
            events: &mut self.events,
        };
        self.escorts.cancel_escort(guard, world, &mut deps)
    }

    // ── Tick ──

    pub fn tick<W: JailWorld + ?Sized>(&mut self, world: &mut W, now: SimTime) {
        if now - self.last_breach_check >= self.config.ledger.breach_check_interval {
            self.last_breach_check = now;
            let doors = &self.doors;
            let breaches = self
                .ledger
                .check_breaches(now, world, |door| doors.door_holder(door).is_some());
            self.events.extend(breaches);
        }

        self.doors
            .tick(world, &mut self.ledger, now, &mut self.events);

        let mut deps = EscortDeps {
            doors: &mut self.doors,
            registry: &self.registry,
            ledger: &mut self.ledger,
            events: &mut self.events,
        };
        self.escorts.tick(world, &mut deps, now);

        for (&id, brain) in self.guards.iter_mut() {
            if self.doors.is_busy(id) || self.escorts.is_escorting(id) {
                continue;
            }
            let mut ctx = GuardCtx {
                world: &mut *world,
                config: &self.config.guard,
                now,
                events: &mut self.events,
            };
            brain.tick(&mut ctx);

            let Some(request) = brain.door_request().map(str::to_string) else {
                continue;
            };
            match self.doors.try_begin_transition(
                id,
                &request,
                None,
                &self.registry,
                world,
                now,
                &mut self.events,
            ) {
                Ok(()) => brain.door_request_accepted(),
                Err(TransitionRejected::Registry(_)) => brain.door_request_failed(),
                Err(busy) => debug!("facility: guard {id} waiting on {request}: {busy}"),
            }
        }
    }

    /// Take every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<FacilityEvent> {
        std::mem::take(&mut self.events)
    }
}
