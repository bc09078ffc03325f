//! Facility structure components: doors, named anchor points, blocked routes.

use cellblock_logic::registry::DoorClass;
use serde::{Deserialize, Serialize};

/// A physical door. Locked implies closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Door {
    pub name: String,
    pub class: DoorClass,
    pub closed: bool,
    pub locked: bool,
    /// Jammed doors ignore close commands
    pub jammed: bool,
}

impl Door {
    pub fn new(name: impl Into<String>, class: DoorClass, locked: bool) -> Self {
        Self {
            name: name.into(),
            class,
            closed: true,
            locked,
            jammed: false,
        }
    }

    pub fn open(&mut self) {
        if !self.locked {
            self.closed = false;
        }
    }

    pub fn close(&mut self) {
        if !self.jammed {
            self.closed = true;
        }
    }

    pub fn lock(&mut self) {
        if self.closed {
            self.locked = true;
        }
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }
}

/// Marker for an anchor point the door registry resolves by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedPoint {
    pub name: String,
}

/// Locomotion cannot make progress for `remaining` seconds, or until the
/// actor is given a fresh destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NavBlocked {
    pub remaining: f32,
}
