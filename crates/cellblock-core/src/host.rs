//! Port implementations over the ECS world.
//!
//! [`HostWorld`] borrows the `hecs::World` for the duration of one facility
//! tick and answers navigation, door, messaging and perception calls from
//! components. Actors and doors are looked up through a [`WorldIndex`].

use std::collections::HashMap;

use cellblock_logic::ports::{
    ActorSnapshot, CalmingCapability, DoorPort, MessagingPort, NavigationPort, PerceptionPort,
};
use cellblock_logic::{ActorId, SimTime};
use hecs::{Entity, World};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::components::{Actor, BoundingBox, Door, Mood, Movement, NavBlocked, Position, Vec3};

/// Stable ids → entities
#[derive(Debug, Clone, Default)]
pub struct WorldIndex {
    actors: HashMap<ActorId, Entity>,
    doors: HashMap<String, Entity>,
}

impl WorldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_actor(&mut self, id: ActorId, entity: Entity) {
        self.actors.insert(id, entity);
    }

    pub fn remove_actor(&mut self, id: ActorId) -> Option<Entity> {
        self.actors.remove(&id)
    }

    pub fn insert_door(&mut self, name: impl Into<String>, entity: Entity) {
        self.doors.insert(name.into(), entity);
    }

    pub fn actor(&self, id: ActorId) -> Option<Entity> {
        self.actors.get(&id).copied()
    }

    pub fn door(&self, name: &str) -> Option<Entity> {
        self.doors.get(name).copied()
    }

    pub fn actor_ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.actors.keys().copied()
    }
}

/// A prompt shown to an actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub actor: ActorId,
    pub text: String,
    pub duration_hint: f32,
    pub at: SimTime,
}

/// Borrowed view of the world that implements every facility port
pub struct HostWorld<'a> {
    world: &'a mut World,
    index: &'a WorldIndex,
    bounds: BoundingBox,
    transcripts: &'a mut Vec<Transcript>,
    now: SimTime,
}

impl<'a> HostWorld<'a> {
    pub fn new(
        world: &'a mut World,
        index: &'a WorldIndex,
        bounds: BoundingBox,
        transcripts: &'a mut Vec<Transcript>,
        now: SimTime,
    ) -> Self {
        Self {
            world,
            index,
            bounds,
            transcripts,
            now,
        }
    }

    fn entity(&self, actor: ActorId) -> Option<Entity> {
        self.index.actor(actor).filter(|e| self.world.contains(*e))
    }

    fn with_door<R>(&mut self, door: &str, f: impl FnOnce(&mut Door) -> R) -> Option<R> {
        let entity = self.index.door(door)?;
        let mut component = self.world.get::<&mut Door>(entity).ok()?;
        Some(f(&mut *component))
    }

    fn door_state(&self, door: &str) -> Option<(bool, bool)> {
        let entity = self.index.door(door)?;
        let component = self.world.get::<&Door>(entity).ok()?;
        Some((component.closed, component.locked))
    }
}

// ── Navigation ──

impl NavigationPort for HostWorld<'_> {
    fn find_navigable_point_near(&self, position: Vec3, radius: f32) -> Option<Vec3> {
        let clamped = self.bounds.clamp(&position);
        (clamped.distance(&position) <= radius).then_some(clamped)
    }

    fn move_to(&mut self, actor: ActorId, destination: Vec3, speed_multiplier: f32) -> bool {
        let Some(entity) = self.entity(actor) else {
            return false;
        };
        if !self.bounds.contains(&destination) {
            debug!("host: {actor} refused move to {destination:?}");
            return false;
        }
        let Ok(speed) = self.world.get::<&Actor>(entity).map(|a| a.speed) else {
            return false;
        };
        let _ = self.world.remove_one::<NavBlocked>(entity);
        self.world
            .insert_one(entity, Movement::new(destination, speed * speed_multiplier))
            .is_ok()
    }

    fn stop(&mut self, actor: ActorId) {
        if let Some(entity) = self.entity(actor) {
            let _ = self.world.remove_one::<Movement>(entity);
        }
    }

    fn has_arrived(&self, actor: ActorId) -> bool {
        self.entity(actor)
            .is_some_and(|e| self.world.get::<&Movement>(e).is_err())
    }

    fn remaining_distance(&self, actor: ActorId) -> f32 {
        let Some(entity) = self.entity(actor) else {
            return 0.0;
        };
        match (
            self.world.get::<&Position>(entity),
            self.world.get::<&Movement>(entity),
        ) {
            (Ok(pos), Ok(movement)) => pos.local.distance(&movement.destination),
            _ => 0.0,
        }
    }

    fn position(&self, actor: ActorId) -> Option<Vec3> {
        let entity = self.entity(actor)?;
        self.world.get::<&Position>(entity).ok().map(|p| p.local)
    }

    fn warp(&mut self, actor: ActorId, position: Vec3) {
        let Some(entity) = self.entity(actor) else {
            return;
        };
        if let Ok(mut pos) = self.world.get::<&mut Position>(entity) {
            pos.local = position;
        }
        let _ = self.world.remove_one::<Movement>(entity);
    }

    fn is_navigation_blocked(&self, actor: ActorId) -> bool {
        self.entity(actor)
            .is_some_and(|e| self.world.get::<&NavBlocked>(e).is_ok())
    }
}

// ── Doors ──

impl DoorPort for HostWorld<'_> {
    fn open(&mut self, door: &str) {
        self.with_door(door, Door::open);
    }

    fn close(&mut self, door: &str) {
        self.with_door(door, Door::close);
    }

    fn is_closed(&self, door: &str) -> bool {
        self.door_state(door).map_or(true, |(closed, _)| closed)
    }

    fn lock(&mut self, door: &str) {
        self.with_door(door, Door::lock);
    }

    fn unlock(&mut self, door: &str) {
        self.with_door(door, Door::unlock);
    }

    fn is_locked(&self, door: &str) -> bool {
        self.door_state(door).is_some_and(|(_, locked)| locked)
    }
}

// ── Messaging ──

impl MessagingPort for HostWorld<'_> {
    fn send_transcript_message(&mut self, actor: ActorId, text: &str, duration_hint: f32) {
        debug!("host: [{actor}] {text}");
        self.transcripts.push(Transcript {
            actor,
            text: text.to_string(),
            duration_hint,
            at: self.now,
        });
    }
}

// ── Perception ──

impl CalmingCapability for HostWorld<'_> {
    fn force_calm(&mut self, actor: ActorId) -> bool {
        let Some(entity) = self.entity(actor) else {
            return false;
        };
        match self.world.get::<&mut Mood>(entity) {
            Ok(mut mood) => {
                mood.calm();
                true
            }
            Err(_) => false,
        }
    }
}

impl PerceptionPort for HostWorld<'_> {
    fn nearby_actors(&self, around: Vec3, radius: f32) -> Vec<ActorSnapshot> {
        let mut nearby: Vec<ActorSnapshot> = self
            .world
            .query::<(&Actor, &Position, Option<&Mood>)>()
            .iter()
            .filter(|(_, (_, pos, _))| pos.local.distance(&around) <= radius)
            .map(|(_, (actor, pos, mood))| snapshot_of(actor, pos, mood))
            .collect();
        nearby.sort_by_key(|s| s.id);
        nearby
    }

    fn snapshot(&self, actor: ActorId) -> Option<ActorSnapshot> {
        let entity = self.entity(actor)?;
        let mut query = self
            .world
            .query_one::<(&Actor, &Position, Option<&Mood>)>(entity)
            .ok()?;
        let (actor, pos, mood) = query.get()?;
        Some(snapshot_of(actor, pos, mood))
    }

    fn set_facing(&mut self, actor: ActorId, yaw: f32) {
        if let Some(entity) = self.entity(actor) {
            if let Ok(mut pos) = self.world.get::<&mut Position>(entity) {
                pos.facing = yaw;
            }
        }
    }

    fn calming(&mut self) -> Option<&mut dyn CalmingCapability> {
        Some(self)
    }
}

fn snapshot_of(actor: &Actor, pos: &Position, mood: Option<&Mood>) -> ActorSnapshot {
    ActorSnapshot {
        id: actor.id,
        position: pos.local,
        suspicion: mood.map_or(0.0, |m| m.suspicion),
        aggressive: mood.is_some_and(Mood::is_aggressive),
        is_guard: actor.is_guard(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Role;
    use cellblock_logic::registry::DoorClass;

    struct Fixture {
        world: World,
        index: WorldIndex,
        transcripts: Vec<Transcript>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut world = World::new();
            let mut index = WorldIndex::new();
            let guard = world.spawn((
                Actor { id: 1, role: Role::Guard, speed: 2.0 },
                Position::new(0.0, 0.0),
            ));
            let inmate = world.spawn((
                Actor { id: 2, role: Role::Inmate, speed: 1.0 },
                Position::new(3.0, 0.0),
                Mood { agitation: 0.9, suspicion: 0.7, volatility: 0.0 },
            ));
            let door = world.spawn((Door::new("Cell_0_Door", DoorClass::Cell, true),));
            index.insert_actor(1, guard);
            index.insert_actor(2, inmate);
            index.insert_door("Cell_0_Door", door);
            Self {
                world,
                index,
                transcripts: Vec::new(),
            }
        }

        fn host(&mut self) -> HostWorld<'_> {
            let bounds = BoundingBox::new(Vec3::new(-10.0, -10.0, 0.0), Vec3::new(10.0, 10.0, 0.0));
            HostWorld::new(&mut self.world, &self.index, bounds, &mut self.transcripts, 4.0)
        }
    }

    #[test]
    fn test_move_to_applies_speed_and_bounds() {
        let mut fx = Fixture::new();
        let mut host = fx.host();

        assert!(host.move_to(1, Vec3::new(5.0, 0.0, 0.0), 1.5));
        assert!(!host.has_arrived(1));
        assert_eq!(host.remaining_distance(1), 5.0);
        assert!(!host.move_to(1, Vec3::new(50.0, 0.0, 0.0), 1.0));
        assert!(!host.move_to(99, Vec3::ZERO, 1.0));

        let entity = fx.index.actor(1).unwrap();
        assert_eq!(fx.world.get::<&Movement>(entity).unwrap().speed, 3.0);
    }

    #[test]
    fn test_fresh_destination_clears_block() {
        let mut fx = Fixture::new();
        let entity = fx.index.actor(1).unwrap();
        fx.world.insert_one(entity, NavBlocked { remaining: 10.0 }).unwrap();

        let mut host = fx.host();
        assert!(host.is_navigation_blocked(1));
        host.move_to(1, Vec3::new(1.0, 1.0, 0.0), 1.0);
        assert!(!host.is_navigation_blocked(1));
    }

    #[test]
    fn test_navigable_point_clamps_within_radius() {
        let mut fx = Fixture::new();
        let host = fx.host();

        assert_eq!(
            host.find_navigable_point_near(Vec3::new(11.0, 0.0, 0.0), 2.0),
            Some(Vec3::new(10.0, 0.0, 0.0))
        );
        assert_eq!(host.find_navigable_point_near(Vec3::new(15.0, 0.0, 0.0), 2.0), None);
    }

    #[test]
    fn test_locked_door_needs_unlock() {
        let mut fx = Fixture::new();
        let mut host = fx.host();

        host.open("Cell_0_Door");
        assert!(host.is_closed("Cell_0_Door"));
        host.unlock("Cell_0_Door");
        host.open("Cell_0_Door");
        assert!(!host.is_closed("Cell_0_Door"));
        assert!(!host.is_locked("Cell_0_Door"));

        // Unknown doors read as closed and unlocked
        assert!(host.is_closed("NoSuchDoor"));
        assert!(!host.is_locked("NoSuchDoor"));
    }

    #[test]
    fn test_perception_and_calming() {
        let mut fx = Fixture::new();
        let mut host = fx.host();

        let nearby = host.nearby_actors(Vec3::ZERO, 5.0);
        assert_eq!(nearby.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(nearby[0].is_guard);
        assert!(nearby[1].aggressive);
        assert_eq!(host.nearby_actors(Vec3::ZERO, 1.0).len(), 1);

        let calming = host.calming().unwrap();
        assert!(calming.force_calm(2));
        assert!(!calming.force_calm(1));
        let inmate = host.snapshot(2).unwrap();
        assert!(!inmate.aggressive);
        assert_eq!(inmate.suspicion, 0.0);
    }

    #[test]
    fn test_messages_are_timestamped() {
        let mut fx = Fixture::new();
        fx.host().send_transcript_message(2, "Keep moving.", 3.0);
        assert_eq!(fx.transcripts.len(), 1);
        assert_eq!(fx.transcripts[0].at, 4.0);
        assert_eq!(fx.transcripts[0].actor, 2);
    }
}
