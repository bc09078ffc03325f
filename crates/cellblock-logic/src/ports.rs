//! Port traits for the collaborators the state machines drive.
//!
//! Nothing in this crate touches an engine directly. A host world implements
//! these traits (the ECS world in `cellblock-core`, or the fake world used by
//! unit tests) and hands itself to [`crate::facility::Facility::tick`].
//!
//! | Port | Collaborator |
//! |------|--------------|
//! | [`NavigationPort`] | Navmesh queries and actor locomotion |
//! | [`DoorPort`] | Physical door open/closed/locked control |
//! | [`MessagingPort`] | Fire-and-forget transcript prompts |
//! | [`PerceptionPort`] | Nearby actor snapshots for the guard scan |
//! | [`RecordStore`] | Persisted rap sheets |

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::rap_sheet::RapSheet;
use crate::ActorId;

/// Navigation collaborator.
pub trait NavigationPort {
    /// Closest walkable point within `radius` of `position`.
    fn find_navigable_point_near(&self, position: Vec3, radius: f32) -> Option<Vec3>;
    /// Start moving `actor` toward `destination`. Returns `false` when the
    /// command is refused (unknown actor, no route).
    fn move_to(&mut self, actor: ActorId, destination: Vec3, speed_multiplier: f32) -> bool;
    /// Halt any movement in progress.
    fn stop(&mut self, actor: ActorId);
    fn has_arrived(&self, actor: ActorId) -> bool;
    fn remaining_distance(&self, actor: ActorId) -> f32;
    fn position(&self, actor: ActorId) -> Option<Vec3>;
    fn warp(&mut self, actor: ActorId, position: Vec3);
    /// Locomotion reports it cannot make progress toward its destination.
    fn is_navigation_blocked(&self, actor: ActorId) -> bool;
}

/// Physical door control, keyed by symbolic door name.
pub trait DoorPort {
    fn open(&mut self, door: &str);
    fn close(&mut self, door: &str);
    fn is_closed(&self, door: &str) -> bool;
    fn lock(&mut self, door: &str);
    fn unlock(&mut self, door: &str);
    fn is_locked(&self, door: &str) -> bool;
}

/// Prompts shown to an actor (player subtitle, NPC bark).
pub trait MessagingPort {
    fn send_transcript_message(&mut self, actor: ActorId, text: &str, duration_hint: f32);
}

/// What a guard can observe about another actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub position: Vec3,
    /// 0.0 (innocuous) to 1.0 (blatant).
    pub suspicion: f32,
    /// The actor's own behaviour is currently hostile.
    pub aggressive: bool,
    /// Guards are never scan candidates.
    pub is_guard: bool,
}

/// Optional host capability: force another actor's behaviour to calm down.
pub trait CalmingCapability {
    /// Returns `false` when the actor could not be calmed.
    fn force_calm(&mut self, actor: ActorId) -> bool;
}

/// Perception collaborator for the guard scan.
pub trait PerceptionPort {
    /// Actors within `radius` of `around`, in the host's iteration order.
    fn nearby_actors(&self, around: Vec3, radius: f32) -> Vec<ActorSnapshot>;
    fn snapshot(&self, actor: ActorId) -> Option<ActorSnapshot>;
    /// Rotate an actor in place (radians around the vertical axis).
    fn set_facing(&mut self, actor: ActorId, yaw: f32);
    /// Hosts without a behaviour override return `None`.
    fn calming(&mut self) -> Option<&mut dyn CalmingCapability> {
        None
    }
}

/// Everything [`crate::facility::Facility`] needs from a host world.
pub trait JailWorld: NavigationPort + DoorPort + MessagingPort + PerceptionPort {}

impl<T> JailWorld for T where T: NavigationPort + DoorPort + MessagingPort + PerceptionPort {}

/// Rap-sheet persistence.
pub trait RecordStore {
    fn get_record(&self, actor: ActorId) -> Option<RapSheet>;
    fn save_record(&mut self, record: RapSheet) -> Result<(), crate::error::StoreError>;
}
