//! Cellblock Core - Cell Block Simulation Engine
//!
//! An ECS host for the behaviour logic in `cellblock-logic`. Guards, inmates,
//! doors and anchor points live in a `hecs` world; [`host::HostWorld`]
//! exposes that world through the facility's port traits, and
//! [`engine::SimulationEngine`] advances both together.
//!
//! # Architecture
//!
//! - **Components**: Pure data attached to entities (Position, Mood, Door, etc.)
//! - **Systems**: Movement, escort following and mood drift
//! - **Facility**: Guard FSMs, door choreography and escorts, ticked every frame
//!
//! # Example
//!
//! ```rust,no_run
//! use cellblock_core::prelude::*;
//!
//! let mut engine = SimulationEngine::new(FacilityConfig::default(), 42);
//! engine.populate(3, 12);
//!
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for event in engine.drain_events() {
//!         println!("{event:?}");
//!     }
//! }
//! ```

pub mod components;
pub mod engine;
pub mod generation;
pub mod host;
pub mod persistence;
pub mod records;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{InmateProfile, SimulationEngine};
    pub use cellblock_logic::config::FacilityConfig;
    pub use cellblock_logic::events::FacilityEvent;
    pub use cellblock_logic::ActorId;
}
