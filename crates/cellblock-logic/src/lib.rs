//! Pure behaviour logic for Cellblock.
//!
//! This crate contains the guard and escort state machines and the door
//! choreography they share. Nothing here owns an engine: every collaborator
//! (navigation, doors, prompts, perception, records) is a trait in [`ports`],
//! so the same logic runs against the ECS world in `cellblock-core` or a
//! hand-written fake in unit tests.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Timings, radii and thresholds with validation |
//! | [`door_ops`] | Per-actor door crossing state machine, per-door tokens |
//! | [`error`] | Registry, rejection and store errors |
//! | [`escort`] | Multi-station escort sequencing |
//! | [`events`] | Facility events for the policy layer |
//! | [`facility`] | Context object owning every subsystem of one jail |
//! | [`geometry`] | Vector math and the door-plane test |
//! | [`guard`] | Guard behaviour FSM (Idle, Patrol, Investigate, PatDown, Intervention) |
//! | [`ledger`] | Door security obligations and breach recovery |
//! | [`ports`] | Collaborator traits implemented by the host world |
//! | [`rap_sheet`] | Per-inmate violation records |
//! | [`registry`] | Symbolic transition ids → resolved door crossings |

pub mod config;
pub mod door_ops;
pub mod error;
pub mod escort;
pub mod events;
pub mod facility;
pub mod geometry;
pub mod guard;
pub mod ledger;
pub mod ports;
pub mod rap_sheet;
pub mod registry;

#[cfg(test)]
mod testing;

/// Stable actor identity shared with the host world.
pub type ActorId = u32;

/// Simulation time in seconds.
pub type SimTime = f64;
