//! Per-inmate violation records.
//!
//! The door and escort engines never read these. Only the policy layer does:
//! search results are written back here, and [`RapSheet::needs_booking`]
//! decides whether an inmate gets walked through the booking stations.
//!
//! ```
//! use cellblock_logic::rap_sheet::{RapSheet, ViolationKind};
//!
//! let mut sheet = RapSheet::new(7, "Dale");
//! assert!(!sheet.needs_booking());
//! sheet.add_violation(ViolationKind::Contraband, 12.0);
//! assert!(sheet.needs_booking());
//! ```

use serde::{Deserialize, Serialize};

use crate::{ActorId, SimTime};

/// Violations that stay on an inmate's sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    Contraband,
    Assault,
    Trespassing,
    Disorderly,
}

impl ViolationKind {
    /// Severity used for booking decisions. Anything ≥ 2 books immediately.
    pub fn severity(&self) -> u8 {
        match self {
            ViolationKind::Disorderly => 1,
            ViolationKind::Trespassing => 1,
            ViolationKind::Contraband => 2,
            ViolationKind::Assault => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Simulation time the violation was recorded.
    pub at: SimTime,
}

/// Minor violations that add up to a booking.
const MINOR_VIOLATIONS_BEFORE_BOOKING: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RapSheet {
    pub actor: ActorId,
    pub name: String,
    pub violations: Vec<Violation>,
    /// Completed pat-downs.
    pub times_searched: u32,
    /// Contraband items found over all searches.
    pub contraband_count: u32,
    /// Walked through the booking stations since the last violation.
    pub booked: bool,
}

impl RapSheet {
    pub fn new(actor: ActorId, name: impl Into<String>) -> Self {
        Self {
            actor,
            name: name.into(),
            violations: Vec::new(),
            times_searched: 0,
            contraband_count: 0,
            booked: false,
        }
    }

    /// Record a violation. A new violation voids any earlier booking.
    pub fn add_violation(&mut self, kind: ViolationKind, at: SimTime) {
        self.violations.push(Violation { kind, at });
        self.booked = false;
    }

    /// Record a completed pat-down and what it turned up.
    pub fn record_search(&mut self, contraband_found: u32, at: SimTime) {
        self.times_searched += 1;
        if contraband_found > 0 {
            self.contraband_count += contraband_found;
            self.add_violation(ViolationKind::Contraband, at);
        }
    }

    pub fn mark_booked(&mut self) {
        self.booked = true;
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    /// Unbooked inmate with a serious violation, or with enough minor ones.
    pub fn needs_booking(&self) -> bool {
        if self.booked {
            return false;
        }
        let serious = self.violations.iter().any(|v| v.kind.severity() >= 2);
        serious || self.violations.len() >= MINOR_VIOLATIONS_BEFORE_BOOKING
    }

    pub fn last_violation_at(&self) -> Option<SimTime> {
        self.violations.last().map(|v| v.at)
    }
}
