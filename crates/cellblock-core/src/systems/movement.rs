//! Movement system - updates positions for entities with Movement component

use hecs::World;

use crate::components::{Movement, NavBlocked, Position};

/// Move entities toward their destinations. Blocked entities hold still
/// until their block runs out.
pub fn movement_system(world: &mut World, delta_seconds: f32) {
    tick_blocks(world, delta_seconds);

    let mut updates: Vec<(hecs::Entity, Position, Option<Movement>)> = Vec::with_capacity(64);

    for (entity, (pos, movement)) in world.query::<(&Position, &Movement)>().iter() {
        if world.get::<&NavBlocked>(entity).is_ok() {
            continue;
        }
        let (new_pos, new_movement) = process_movement(pos, movement, delta_seconds);
        updates.push((entity, new_pos, new_movement));
    }

    for (entity, new_pos, new_movement) in updates {
        if let Ok(mut pos) = world.get::<&mut Position>(entity) {
            *pos = new_pos;
        }
        if new_movement.is_none() {
            // Arrived
            let _ = world.remove_one::<Movement>(entity);
        }
    }
}

/// Count down navigation blocks and clear the expired ones
fn tick_blocks(world: &mut World, delta_seconds: f32) {
    let mut expired = Vec::new();
    for (entity, blocked) in world.query_mut::<&mut NavBlocked>() {
        blocked.remaining -= delta_seconds;
        if blocked.remaining <= 0.0 {
            expired.push(entity);
        }
    }
    for entity in expired {
        let _ = world.remove_one::<NavBlocked>(entity);
    }
}

/// Returns the new position and the movement, or `None` once arrived
fn process_movement(pos: &Position, movement: &Movement, delta_seconds: f32) -> (Position, Option<Movement>) {
    let current = pos.local;
    let target = movement.destination;
    let diff = target - current;
    let distance = diff.length();
    let step = movement.speed * delta_seconds;

    if distance < 0.01 || step >= distance {
        return (Position { local: target, ..*pos }, None);
    }

    let direction = diff.normalize();
    let new_pos = Position {
        local: current + direction * step,
        facing: direction.y.atan2(direction.x),
    };
    (new_pos, Some(*movement))
}
