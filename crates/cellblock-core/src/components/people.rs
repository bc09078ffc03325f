//! People-related components: Actor, Mood, Contraband, Following.

use cellblock_logic::ActorId;
use serde::{Deserialize, Serialize};

use super::Vec3;

/// Who an actor is in the block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Guard,
    Inmate,
}

/// Every guard and inmate carries one of these
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Actor {
    /// Stable id used by the facility logic
    pub id: ActorId,
    pub role: Role,
    /// Walking speed in units per second
    pub speed: f32,
}

impl Actor {
    pub fn is_guard(&self) -> bool {
        self.role == Role::Guard
    }
}

/// Agitation at or above this makes an inmate aggressive
pub const AGGRESSION_THRESHOLD: f32 = 0.85;

/// Inmate temperament - all values 0.0 to 1.0
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Mood {
    pub agitation: f32,
    /// How suspicious the inmate looks to a guard
    pub suspicion: f32,
    /// How fast agitation wanders
    pub volatility: f32,
}

impl Mood {
    pub fn new(agitation: f32, volatility: f32) -> Self {
        Self {
            agitation,
            suspicion: 0.0,
            volatility,
        }
    }

    pub fn is_aggressive(&self) -> bool {
        self.agitation >= AGGRESSION_THRESHOLD
    }

    /// Drop back to a resting state after an intervention
    pub fn calm(&mut self) {
        self.agitation = 0.1;
        self.suspicion = 0.0;
    }
}

/// Items an inmate is hiding
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Contraband {
    pub items: u32,
}

/// Walk after another actor, or to a waypoint when one is set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Following {
    pub leader: ActorId,
    /// Stop this far from the leader
    pub distance: f32,
    pub waypoint: Option<Vec3>,
}

impl Following {
    pub fn new(leader: ActorId, distance: f32) -> Self {
        Self {
            leader,
            distance,
            waypoint: None,
        }
    }
}
