//! Notifications emitted by the facility for whatever policy layer drives it.

use serde::{Deserialize, Serialize};

use crate::door_ops::DoorPhase;
use crate::guard::GuardState;
use crate::{ActorId, SimTime};

/// Why a door operation ended early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The operating actor no longer exists in the world.
    ActorMissing,
    /// The escorted actor no longer exists in the world.
    EscortedActorMissing,
    /// The navigation collaborator refused the move command.
    NavigationRefused,
}

/// Something the facility did or noticed during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FacilityEvent {
    // ── Door transitions ──
    PhaseEntered {
        actor: ActorId,
        transition: String,
        phase: DoorPhase,
        at: SimTime,
    },
    NavigationTimeout {
        actor: ActorId,
        transition: String,
        phase: DoorPhase,
    },
    EscortReminder {
        actor: ActorId,
        escorted: ActorId,
        transition: String,
    },
    TransitionCompleted {
        actor: ActorId,
        transition: String,
        at: SimTime,
    },
    TransitionFailed {
        actor: ActorId,
        transition: String,
        phase: DoorPhase,
        reason: AbortReason,
    },
    OperationStopped {
        actor: ActorId,
        transition: String,
        phase: DoorPhase,
    },

    // ── Ledger ──
    SecurityBreach {
        door: String,
        opened_by: ActorId,
        open_for: f64,
    },

    // ── Guards ──
    GuardStateChanged {
        guard: ActorId,
        from: GuardState,
        to: GuardState,
        target: Option<ActorId>,
    },
    SearchCompleted {
        guard: ActorId,
        target: ActorId,
    },
    InterventionResolved {
        guard: ActorId,
        target: ActorId,
        calmed: bool,
    },

    // ── Escorts ──
    StationCompleted {
        guard: ActorId,
        prisoner: ActorId,
        station: String,
        completed: usize,
        total: usize,
        timed_out: bool,
    },
    GuidancePrompt {
        guard: ActorId,
        prisoner: ActorId,
    },
    EscortCompleted {
        guard: ActorId,
        prisoner: ActorId,
    },
    EscortCancelled {
        guard: ActorId,
        prisoner: ActorId,
        completed: usize,
    },
}
