//! Follow system - escorted inmates trail their guard

use std::collections::HashMap;

use cellblock_logic::ActorId;
use hecs::World;

use crate::components::{Actor, Following, Movement, Position, Vec3};

/// Followers this close to a waypoint count as there
const WAYPOINT_TOLERANCE: f32 = 0.1;

/// Re-aim every follower at its waypoint, or at its leader while further
/// than the follow distance. Followers whose leader is gone stop.
pub fn follow_system(world: &mut World) {
    let positions: HashMap<ActorId, Vec3> = world
        .query::<(&Actor, &Position)>()
        .iter()
        .map(|(_, (actor, pos))| (actor.id, pos.local))
        .collect();

    let mut orders: Vec<(hecs::Entity, Option<Movement>)> = Vec::new();
    for (entity, (actor, pos, following)) in world.query::<(&Actor, &Position, &Following)>().iter() {
        let order = match following.waypoint {
            Some(waypoint) if pos.local.distance(&waypoint) > WAYPOINT_TOLERANCE => {
                Some(Movement::new(waypoint, actor.speed))
            }
            Some(_) => None,
            None => positions
                .get(&following.leader)
                .filter(|leader| pos.local.distance(leader) > following.distance)
                .map(|leader| Movement::new(*leader, actor.speed)),
        };
        orders.push((entity, order));
    }

    for (entity, order) in orders {
        match order {
            Some(movement) => {
                let _ = world.insert_one(entity, movement);
            }
            None => {
                let _ = world.remove_one::<Movement>(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Role;

    fn actor(id: ActorId, role: Role) -> Actor {
        Actor { id, role, speed: 1.0 }
    }

    #[test]
    fn test_follower_heads_for_leader_until_close() {
        let mut world = World::new();
        world.spawn((actor(1, Role::Guard), Position::new(5.0, 0.0)));
        let follower = world.spawn((
            actor(2, Role::Inmate),
            Position::new(0.0, 0.0),
            Following::new(1, 1.0),
        ));

        follow_system(&mut world);
        assert_eq!(
            world.get::<&Movement>(follower).unwrap().destination,
            Vec3::new(5.0, 0.0, 0.0)
        );

        world.get::<&mut Position>(follower).unwrap().local = Vec3::new(4.5, 0.0, 0.0);
        follow_system(&mut world);
        assert!(world.get::<&Movement>(follower).is_err());
    }

    #[test]
    fn test_waypoint_overrides_leader() {
        let mut world = World::new();
        world.spawn((actor(1, Role::Guard), Position::new(0.0, 0.0)));
        let mut following = Following::new(1, 1.0);
        following.waypoint = Some(Vec3::new(0.0, -3.0, 0.0));
        let follower = world.spawn((actor(2, Role::Inmate), Position::new(0.5, 0.0), following));

        follow_system(&mut world);
        assert_eq!(
            world.get::<&Movement>(follower).unwrap().destination,
            Vec3::new(0.0, -3.0, 0.0)
        );
    }

    #[test]
    fn test_missing_leader_stops_follower() {
        let mut world = World::new();
        let follower = world.spawn((
            actor(2, Role::Inmate),
            Position::new(0.0, 0.0),
            Following::new(99, 1.0),
            Movement::new(Vec3::new(9.0, 0.0, 0.0), 1.0),
        ));

        follow_system(&mut world);
        assert!(world.get::<&Movement>(follower).is_err());
    }
}
