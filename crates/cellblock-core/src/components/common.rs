//! Common components used across multiple entity types.

use serde::{Deserialize, Serialize};

pub use cellblock_logic::geometry::{BoundingBox, Vec3};

/// Position in block coordinates (metres, z up)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub local: Vec3,
    /// Heading in radians around the vertical axis
    pub facing: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            local: Vec3::new(x, y, 0.0),
            facing: 0.0,
        }
    }

    pub fn at(local: Vec3) -> Self {
        Self { local, facing: 0.0 }
    }
}

/// Straight-line movement toward a destination. Removed on arrival.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Movement {
    pub destination: Vec3,
    /// Units per second, speed multiplier already applied
    pub speed: f32,
}

impl Movement {
    pub fn new(destination: Vec3, speed: f32) -> Self {
        Self { destination, speed }
    }
}

/// Name component
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Name {
    pub given: String,
    pub family: String,
    pub nickname: Option<String>,
}

impl Name {
    pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            family: family.into(),
            nickname: None,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn full_name(&self) -> String {
        match &self.nickname {
            Some(nick) => format!("{} \"{}\" {}", self.given, nick, self.family),
            None => format!("{} {}", self.given, self.family),
        }
    }

    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.given)
    }
}
