//! Error types.
//!
//! Only conditions a caller can act on are errors. Navigation timeouts,
//! breaches and mid-sequence aborts are reported as
//! [`crate::events::FacilityEvent`]s instead.

use thiserror::Error;

use crate::ActorId;

/// Door registry failures. Permanent: a missing point or door is a
/// configuration defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown transition `{0}`")]
    NotFound(String),
    #[error("transition `{id}` references missing point `{point}`")]
    MissingPoint { id: String, point: String },
    #[error("transition `{id}` references missing door `{door}`")]
    MissingDoor { id: String, door: String },
    #[error("transition `{0}` was marked unusable at load")]
    Unusable(String),
}

/// Why `begin_transition` refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionRejected {
    #[error("actor {0} already has a door operation in flight")]
    ActorBusy(ActorId),
    #[error("door `{door}` is held by actor {holder}")]
    DoorBusy { door: String, holder: ActorId },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Why `start_escort` refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscortRejected {
    #[error("guard {0} is already escorting")]
    GuardBusy(ActorId),
    #[error("actor {0} is already being escorted")]
    AlreadyEscorted(ActorId),
    #[error("an actor cannot escort itself")]
    SelfEscort,
    #[error("escort route has no stations")]
    EmptyRoute,
}

/// Rap-sheet store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store backend failed: {0}")]
    Backend(String),
}
