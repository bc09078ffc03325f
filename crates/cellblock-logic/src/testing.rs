//! In-memory host world for unit tests.
//!
//! Actors walk in straight lines at a fixed speed when [`FakeWorld::step`] is
//! called; doors honour locked ⇒ closed and can be jammed open.

use std::collections::{BTreeMap, HashMap};

use crate::geometry::Vec3;
use crate::ports::{
    ActorSnapshot, CalmingCapability, DoorPort, MessagingPort, NavigationPort, PerceptionPort,
};
use crate::ActorId;

#[derive(Debug, Clone)]
pub struct FakeActor {
    pub position: Vec3,
    pub destination: Option<Vec3>,
    pub speed: f32,
    pub multiplier: f32,
    pub facing: f32,
    pub suspicion: f32,
    pub aggressive: bool,
    pub is_guard: bool,
    pub blocked: bool,
}

#[derive(Debug, Clone, Default)]
struct FakeDoor {
    closed: bool,
    locked: bool,
    jammed: bool,
}

#[derive(Debug, Default)]
pub struct FakeWorld {
    pub actors: BTreeMap<ActorId, FakeActor>,
    doors: HashMap<String, FakeDoor>,
    pub messages: Vec<(ActorId, String)>,
    pub calm_supported: bool,
    pub calmed: Vec<ActorId>,
    pub refuse_moves: bool,
    /// Blocked actors are released once `move_calls` reaches this.
    pub unblock_after_moves: Option<usize>,
    pub move_calls: usize,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self {
            calm_supported: true,
            ..Default::default()
        }
    }

    pub fn add_actor(&mut self, id: ActorId, position: Vec3, speed: f32) {
        self.actors.insert(
            id,
            FakeActor {
                position,
                destination: None,
                speed,
                multiplier: 1.0,
                facing: 0.0,
                suspicion: 0.0,
                aggressive: false,
                is_guard: false,
                blocked: false,
            },
        );
    }

    pub fn add_guard(&mut self, id: ActorId, position: Vec3, speed: f32) {
        self.add_actor(id, position, speed);
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.is_guard = true;
        }
    }

    pub fn remove_actor(&mut self, id: ActorId) {
        self.actors.remove(&id);
    }

    pub fn actor(&self, id: ActorId) -> &FakeActor {
        &self.actors[&id]
    }

    pub fn actor_mut(&mut self, id: ActorId) -> &mut FakeActor {
        self.actors.get_mut(&id).expect("unknown fake actor")
    }

    /// Doors start closed.
    pub fn add_door(&mut self, name: &str, locked: bool) {
        self.doors.insert(
            name.to_string(),
            FakeDoor {
                closed: true,
                locked,
                jammed: false,
            },
        );
    }

    /// Jammed doors ignore close commands.
    pub fn jam(&mut self, name: &str) {
        if let Some(door) = self.doors.get_mut(name) {
            door.jammed = true;
        }
    }

    /// Report `id` as blocked until `moves` more `move_to` calls happen.
    pub fn block(&mut self, id: ActorId, moves: usize) {
        self.actor_mut(id).blocked = true;
        self.unblock_after_moves = Some(self.move_calls + moves);
    }

    pub fn step(&mut self, dt: f32) {
        for actor in self.actors.values_mut() {
            if actor.blocked {
                continue;
            }
            if let Some(dest) = actor.destination {
                actor.position = actor
                    .position
                    .move_towards(&dest, actor.speed * actor.multiplier * dt);
                if actor.position == dest {
                    actor.destination = None;
                }
            }
        }
    }
}

impl NavigationPort for FakeWorld {
    fn find_navigable_point_near(&self, position: Vec3, _radius: f32) -> Option<Vec3> {
        Some(position + Vec3::new(0.25, 0.0, 0.0))
    }

    fn move_to(&mut self, actor: ActorId, destination: Vec3, speed_multiplier: f32) -> bool {
        if self.refuse_moves {
            return false;
        }
        self.move_calls += 1;
        let unblock = self
            .unblock_after_moves
            .is_some_and(|limit| self.move_calls >= limit);
        match self.actors.get_mut(&actor) {
            Some(a) => {
                a.destination = Some(destination);
                a.multiplier = speed_multiplier;
                if unblock {
                    a.blocked = false;
                }
                true
            }
            None => false,
        }
    }

    fn stop(&mut self, actor: ActorId) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.destination = None;
        }
    }

    fn has_arrived(&self, actor: ActorId) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|a| a.destination.is_none())
    }

    fn remaining_distance(&self, actor: ActorId) -> f32 {
        self.actors
            .get(&actor)
            .and_then(|a| a.destination.map(|d| a.position.distance(&d)))
            .unwrap_or(0.0)
    }

    fn position(&self, actor: ActorId) -> Option<Vec3> {
        self.actors.get(&actor).map(|a| a.position)
    }

    fn warp(&mut self, actor: ActorId, position: Vec3) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.position = position;
            a.destination = None;
        }
    }

    fn is_navigation_blocked(&self, actor: ActorId) -> bool {
        self.actors.get(&actor).is_some_and(|a| a.blocked)
    }
}

impl DoorPort for FakeWorld {
    fn open(&mut self, door: &str) {
        if let Some(d) = self.doors.get_mut(door) {
            if !d.locked {
                d.closed = false;
            }
        }
    }

    fn close(&mut self, door: &str) {
        if let Some(d) = self.doors.get_mut(door) {
            if !d.jammed {
                d.closed = true;
            }
        }
    }

    fn is_closed(&self, door: &str) -> bool {
        self.doors.get(door).map_or(true, |d| d.closed)
    }

    fn lock(&mut self, door: &str) {
        if let Some(d) = self.doors.get_mut(door) {
            if d.closed {
                d.locked = true;
            }
        }
    }

    fn unlock(&mut self, door: &str) {
        if let Some(d) = self.doors.get_mut(door) {
            d.locked = false;
        }
    }

    fn is_locked(&self, door: &str) -> bool {
        self.doors.get(door).is_some_and(|d| d.locked)
    }
}

impl MessagingPort for FakeWorld {
    fn send_transcript_message(&mut self, actor: ActorId, text: &str, _duration_hint: f32) {
        self.messages.push((actor, text.to_string()));
    }
}

impl CalmingCapability for FakeWorld {
    fn force_calm(&mut self, actor: ActorId) -> bool {
        match self.actors.get_mut(&actor) {
            Some(a) => {
                a.aggressive = false;
                a.suspicion = 0.0;
                self.calmed.push(actor);
                true
            }
            None => false,
        }
    }
}

impl PerceptionPort for FakeWorld {
    fn nearby_actors(&self, around: Vec3, radius: f32) -> Vec<ActorSnapshot> {
        self.actors
            .keys()
            .filter_map(|id| self.snapshot(*id))
            .filter(|s| s.position.distance(&around) <= radius)
            .collect()
    }

    fn snapshot(&self, actor: ActorId) -> Option<ActorSnapshot> {
        self.actors.get(&actor).map(|a| ActorSnapshot {
            id: actor,
            position: a.position,
            suspicion: a.suspicion,
            aggressive: a.aggressive,
            is_guard: a.is_guard,
        })
    }

    fn set_facing(&mut self, actor: ActorId, yaw: f32) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.facing = yaw;
        }
    }

    fn calming(&mut self) -> Option<&mut dyn CalmingCapability> {
        if self.calm_supported {
            Some(self)
        } else {
            None
        }
    }
}
