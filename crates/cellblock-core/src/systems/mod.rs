//! Systems - logic that operates on components

mod follow;
mod mood;
mod movement;

pub use follow::*;
pub use mood::*;
pub use movement::*;
