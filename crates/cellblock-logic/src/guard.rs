//! Guard behaviour state machine.
//!
//! Each guard is exactly one [`GuardState`]. The behaviour of a state lives in
//! three plain functions (enter, update, exit) looked up from [`hooks`]; there
//! is no dynamic state registry.
//!
//! | State | Enter | Update |
//! |-------|-------|--------|
//! | Idle | stop, note idle start | glance left/right every look interval |
//! | Patrol | walk to the current point (cross its door first) | arrive → dwell → next point |
//! | Investigate | walk to target at 1.5× | lost/timeout → fallback, close → PatDown |
//! | PatDown | stop | duration → search event → fallback |
//! | Intervention | walk to target at 2× | lost → fallback, close → calm → fallback |
//!
//! *Fallback* is Patrol for a guard with a route, Idle otherwise.
//!
//! A scan runs every `scan_interval` seconds regardless of state updates. The
//! first nearby actor in host iteration order that is aggressive or above the
//! suspicion threshold becomes the target. PatDown and Intervention ignore the
//! scan.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::GuardConfig;
use crate::events::FacilityEvent;
use crate::geometry::Vec3;
use crate::ports::{ActorSnapshot, JailWorld};
use crate::{ActorId, SimTime};

/// Guard patrol points count as reached within this distance.
const PATROL_ARRIVAL_RADIUS: f32 = 0.5;
/// Re-issue a chase when the target drifts this far from the last destination.
const CHASE_REPATH_DISTANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardState {
    Idle,
    Patrol,
    Investigate,
    PatDown,
    Intervention,
}

impl GuardState {
    /// States the periodic scan may interrupt.
    pub fn is_interruptible(&self) -> bool {
        !matches!(self, GuardState::PatDown | GuardState::Intervention)
    }
}

/// One stop on a patrol route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolPoint {
    pub name: String,
    pub position: Vec3,
    /// Door transition to cross before walking to `position`.
    pub transition: Option<String>,
}

impl PatrolPoint {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            transition: None,
        }
    }

    pub fn through(mut self, transition: impl Into<String>) -> Self {
        self.transition = Some(transition.into());
        self
    }
}

/// Door crossing requested by a patrol leg.
#[derive(Debug, Clone, PartialEq)]
enum Crossing {
    None,
    /// Waiting for the facility to hand the request to the door engine.
    Requested(String),
    /// Accepted by the door engine; the guard is not ticked until it ends.
    Accepted,
}

/// Everything a state hook may touch.
pub struct GuardCtx<'a, W: ?Sized> {
    pub world: &'a mut W,
    pub config: &'a GuardConfig,
    pub now: SimTime,
    pub events: &'a mut Vec<FacilityEvent>,
}

type Hook<W> = fn(&mut GuardBrain, &mut GuardCtx<'_, W>);
type UpdateHook<W> = fn(&mut GuardBrain, &mut GuardCtx<'_, W>) -> Option<(GuardState, Option<ActorId>)>;

/// Enter/update/exit triple for one state.
pub struct StateHooks<W: ?Sized> {
    pub enter: Hook<W>,
    pub update: UpdateHook<W>,
    pub exit: Hook<W>,
}

/// Hook table.
pub fn hooks<W: JailWorld + ?Sized>(state: GuardState) -> StateHooks<W> {
    match state {
        GuardState::Idle => StateHooks {
            enter: idle_enter::<W>,
            update: idle_update::<W>,
            exit: no_exit::<W>,
        },
        GuardState::Patrol => StateHooks {
            enter: patrol_enter::<W>,
            update: patrol_update::<W>,
            exit: patrol_exit::<W>,
        },
        GuardState::Investigate => StateHooks {
            enter: investigate_enter::<W>,
            update: investigate_update::<W>,
            exit: stop_exit::<W>,
        },
        GuardState::PatDown => StateHooks {
            enter: pat_down_enter::<W>,
            update: pat_down_update::<W>,
            exit: no_exit::<W>,
        },
        GuardState::Intervention => StateHooks {
            enter: intervention_enter::<W>,
            update: intervention_update::<W>,
            exit: stop_exit::<W>,
        },
    }
}

/// Per-guard behaviour state.
#[derive(Debug, Clone)]
pub struct GuardBrain {
    pub id: ActorId,
    state: GuardState,
    entered: bool,
    state_started: SimTime,
    target: Option<ActorId>,
    route: Vec<PatrolPoint>,
    route_index: usize,
    dwell_started: Option<SimTime>,
    crossing: Crossing,
    chase_destination: Option<Vec3>,
    last_look: SimTime,
    look_sign: f32,
    last_scan: SimTime,
}

impl GuardBrain {
    /// Start in the fallback state; its enter hook runs on the first tick.
    pub fn new(id: ActorId, route: Vec<PatrolPoint>, now: SimTime) -> Self {
        let state = if route.is_empty() {
            GuardState::Idle
        } else {
            GuardState::Patrol
        };
        Self {
            id,
            state,
            entered: false,
            state_started: now,
            target: None,
            route,
            route_index: 0,
            dwell_started: None,
            crossing: Crossing::None,
            chase_destination: None,
            last_look: now,
            look_sign: 1.0,
            last_scan: now,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn target(&self) -> Option<ActorId> {
        self.target
    }

    pub fn route(&self) -> &[PatrolPoint] {
        &self.route
    }

    /// Index of the patrol point currently headed for.
    pub fn route_index(&self) -> usize {
        self.route_index
    }

    pub fn fallback(&self) -> GuardState {
        if self.route.is_empty() {
            GuardState::Idle
        } else {
            GuardState::Patrol
        }
    }

    /// Transition id this guard wants the door engine to run.
    pub fn door_request(&self) -> Option<&str> {
        match &self.crossing {
            Crossing::Requested(id) => Some(id),
            _ => None,
        }
    }

    /// The door engine accepted the pending request.
    pub fn door_request_accepted(&mut self) {
        if matches!(self.crossing, Crossing::Requested(_)) {
            self.crossing = Crossing::Accepted;
        }
    }

    /// The pending request can never succeed; walk straight to the point.
    pub fn door_request_failed(&mut self) {
        if let Crossing::Requested(id) = &self.crossing {
            warn!("guard {}: dropping crossing {id}, walking directly", self.id);
            self.crossing = Crossing::Accepted;
        }
    }

    /// Hand the guard to another controller (an escort). On the next tick it
    /// re-enters its fallback state from scratch.
    pub fn suspend(&mut self) {
        self.state = self.fallback();
        self.target = None;
        self.crossing = Crossing::None;
        self.dwell_started = None;
        self.chase_destination = None;
        self.entered = false;
    }

    /// Advance one tick: periodic scan, then the current state's update.
    pub fn tick<W: JailWorld + ?Sized>(&mut self, ctx: &mut GuardCtx<'_, W>) {
        if !self.entered {
            self.entered = true;
            self.state_started = ctx.now;
            (hooks::<W>(self.state).enter)(self, ctx);
        }

        if ctx.now - self.last_scan >= ctx.config.scan_interval {
            self.last_scan = ctx.now;
            if let Some((next, target)) = self.scan(ctx) {
                self.transition_to(next, Some(target), ctx);
                return;
            }
        }

        if let Some((next, target)) = (hooks::<W>(self.state).update)(self, ctx) {
            self.transition_to(next, target, ctx);
        }
    }

    /// External command: investigate `target` now, from any state.
    pub fn request_search<W: JailWorld + ?Sized>(
        &mut self,
        target: ActorId,
        ctx: &mut GuardCtx<'_, W>,
    ) -> bool {
        if target == self.id || ctx.world.snapshot(target).is_none() {
            return false;
        }
        info!("guard {}: search ordered on {target}", self.id);
        self.entered = true;
        self.transition_to(GuardState::Investigate, Some(target), ctx);
        true
    }

    /// Run exit, swap state, run enter.
    pub fn transition_to<W: JailWorld + ?Sized>(
        &mut self,
        next: GuardState,
        target: Option<ActorId>,
        ctx: &mut GuardCtx<'_, W>,
    ) {
        let from = self.state;
        (hooks::<W>(from).exit)(self, ctx);

        self.state = next;
        self.target = target;
        self.state_started = ctx.now;
        debug!("guard {}: {from:?} → {next:?} (target {target:?})", self.id);
        ctx.events.push(FacilityEvent::GuardStateChanged {
            guard: self.id,
            from,
            to: next,
            target,
        });

        (hooks::<W>(next).enter)(self, ctx);
    }

    fn scan<W: JailWorld + ?Sized>(&self, ctx: &mut GuardCtx<'_, W>) -> Option<(GuardState, ActorId)> {
        if !self.state.is_interruptible() {
            return None;
        }
        let position = ctx.world.position(self.id)?;
        let candidates: Vec<ActorSnapshot> = ctx
            .world
            .nearby_actors(position, ctx.config.scan_radius)
            .into_iter()
            .filter(|s| s.id != self.id && !s.is_guard)
            .collect();

        for candidate in candidates {
            if candidate.aggressive {
                return Some((GuardState::Intervention, candidate.id));
            }
            // Already investigating: only aggression interrupts.
            if self.state != GuardState::Investigate
                && candidate.suspicion > ctx.config.suspicion_threshold
            {
                return Some((GuardState::Investigate, candidate.id));
            }
        }
        None
    }

    fn elapsed(&self, now: SimTime) -> f64 {
        now - self.state_started
    }

    /// Navigate to the current patrol point, or request its crossing first.
    fn start_patrol_leg<W: JailWorld + ?Sized>(&mut self, ctx: &mut GuardCtx<'_, W>) {
        self.dwell_started = None;
        let Some(point) = self.route.get(self.route_index) else {
            return;
        };
        // Already on the far side (single-point routes): no crossing.
        let there = ctx
            .world
            .position(self.id)
            .is_some_and(|p| p.distance(&point.position) <= PATROL_ARRIVAL_RADIUS);
        if let (Some(transition), Crossing::None, false) = (&point.transition, &self.crossing, there)
        {
            self.crossing = Crossing::Requested(transition.clone());
            return;
        }
        self.crossing = Crossing::None;
        if !ctx.world.move_to(self.id, point.position, 1.0) {
            warn!("guard {}: cannot reach patrol point {}", self.id, point.name);
            self.dwell_started = Some(ctx.now);
        }
    }

    /// Keep chasing `target`. Returns its snapshot, or `None` when lost.
    fn chase<W: JailWorld + ?Sized>(
        &mut self,
        ctx: &mut GuardCtx<'_, W>,
        speed: f32,
    ) -> Option<(ActorSnapshot, f32)> {
        let target = ctx.world.snapshot(self.target?)?;
        let position = ctx.world.position(self.id)?;
        let needs_repath = self
            .chase_destination
            .map_or(true, |dest| dest.distance(&target.position) > CHASE_REPATH_DISTANCE);
        if needs_repath {
            if !ctx.world.move_to(self.id, target.position, speed) {
                return None;
            }
            self.chase_destination = Some(target.position);
        }
        Some((target, position.distance(&target.position)))
    }
}

// ── Idle ──

fn idle_enter<W: JailWorld + ?Sized>(brain: &mut GuardBrain, ctx: &mut GuardCtx<'_, W>) {
    ctx.world.stop(brain.id);
    brain.last_look = ctx.now;
}

fn idle_update<W: JailWorld + ?Sized>(
    brain: &mut GuardBrain,
    ctx: &mut GuardCtx<'_, W>,
) -> Option<(GuardState, Option<ActorId>)> {
    if ctx.now - brain.last_look >= ctx.config.idle_look_interval {
        brain.last_look = ctx.now;
        brain.look_sign = -brain.look_sign;
        ctx.world
            .set_facing(brain.id, brain.look_sign * ctx.config.idle_look_angle);
    }
    None
}

// ── Patrol ──

fn patrol_enter<W: JailWorld + ?Sized>(brain: &mut GuardBrain, ctx: &mut GuardCtx<'_, W>) {
    brain.crossing = Crossing::None;
    brain.start_patrol_leg(ctx);
}

fn patrol_update<W: JailWorld + ?Sized>(
    brain: &mut GuardBrain,
    ctx: &mut GuardCtx<'_, W>,
) -> Option<(GuardState, Option<ActorId>)> {
    match brain.crossing {
        Crossing::Requested(_) => return None,
        Crossing::Accepted => {
            // Back from the door; finish the leg on foot.
            brain.start_patrol_leg(ctx);
            return None;
        }
        Crossing::None => {}
    }

    let point = brain.route.get(brain.route_index)?;
    match brain.dwell_started {
        None => {
            let position = ctx.world.position(brain.id)?;
            if position.distance(&point.position) <= PATROL_ARRIVAL_RADIUS
                || ctx.world.has_arrived(brain.id)
            {
                debug!("guard {}: reached {}", brain.id, point.name);
                brain.dwell_started = Some(ctx.now);
            }
        }
        Some(since) if ctx.now - since >= ctx.config.patrol_dwell => {
            brain.route_index = (brain.route_index + 1) % brain.route.len();
            brain.start_patrol_leg(ctx);
        }
        Some(_) => {}
    }
    None
}

fn patrol_exit<W: JailWorld + ?Sized>(brain: &mut GuardBrain, ctx: &mut GuardCtx<'_, W>) {
    brain.crossing = Crossing::None;
    brain.dwell_started = None;
    ctx.world.stop(brain.id);
}

// ── Investigate ──

fn investigate_enter<W: JailWorld + ?Sized>(brain: &mut GuardBrain, ctx: &mut GuardCtx<'_, W>) {
    brain.chase_destination = None;
    let speed = ctx.config.investigate_speed;
    brain.chase(ctx, speed);
}

fn investigate_update<W: JailWorld + ?Sized>(
    brain: &mut GuardBrain,
    ctx: &mut GuardCtx<'_, W>,
) -> Option<(GuardState, Option<ActorId>)> {
    let speed = ctx.config.investigate_speed;
    let Some((target, distance)) = brain.chase(ctx, speed) else {
        debug!("guard {}: lost investigation target", brain.id);
        return Some((brain.fallback(), None));
    };
    if distance <= ctx.config.pat_down_reach {
        return Some((GuardState::PatDown, Some(target.id)));
    }
    if brain.elapsed(ctx.now) >= ctx.config.investigate_timeout {
        info!("guard {}: gave up on {}", brain.id, target.id);
        return Some((brain.fallback(), None));
    }
    None
}

// ── PatDown ──

fn pat_down_enter<W: JailWorld + ?Sized>(brain: &mut GuardBrain, ctx: &mut GuardCtx<'_, W>) {
    ctx.world.stop(brain.id);
}

fn pat_down_update<W: JailWorld + ?Sized>(
    brain: &mut GuardBrain,
    ctx: &mut GuardCtx<'_, W>,
) -> Option<(GuardState, Option<ActorId>)> {
    if brain.elapsed(ctx.now) < ctx.config.pat_down_duration {
        return None;
    }
    if let Some(target) = brain.target {
        if ctx.world.snapshot(target).is_some() {
            info!("guard {}: searched {target}", brain.id);
            ctx.events.push(FacilityEvent::SearchCompleted {
                guard: brain.id,
                target,
            });
        }
    }
    Some((brain.fallback(), None))
}

// ── Intervention ──

fn intervention_enter<W: JailWorld + ?Sized>(brain: &mut GuardBrain, ctx: &mut GuardCtx<'_, W>) {
    brain.chase_destination = None;
    let speed = ctx.config.intervention_speed;
    brain.chase(ctx, speed);
}

fn intervention_update<W: JailWorld + ?Sized>(
    brain: &mut GuardBrain,
    ctx: &mut GuardCtx<'_, W>,
) -> Option<(GuardState, Option<ActorId>)> {
    let speed = ctx.config.intervention_speed;
    let Some((target, distance)) = brain.chase(ctx, speed) else {
        debug!("guard {}: lost intervention target", brain.id);
        return Some((brain.fallback(), None));
    };
    if distance > ctx.config.intervention_reach {
        return None;
    }

    let calmed = match ctx.world.calming() {
        Some(calming) => calming.force_calm(target.id),
        None => {
            debug!("guard {}: host cannot calm actors", brain.id);
            false
        }
    };
    info!("guard {}: intervened with {} (calmed={calmed})", brain.id, target.id);
    ctx.events.push(FacilityEvent::InterventionResolved {
        guard: brain.id,
        target: target.id,
        calmed,
    });
    Some((brain.fallback(), None))
}

// ── Shared exits ──

fn no_exit<W: JailWorld + ?Sized>(_brain: &mut GuardBrain, _ctx: &mut GuardCtx<'_, W>) {}

fn stop_exit<W: JailWorld + ?Sized>(brain: &mut GuardBrain, ctx: &mut GuardCtx<'_, W>) {
    brain.chase_destination = None;
    ctx.world.stop(brain.id);
}
