//! ECS components for the cell block world

mod common;
mod facility;
mod people;

pub use common::*;
pub use facility::*;
pub use people::*;
