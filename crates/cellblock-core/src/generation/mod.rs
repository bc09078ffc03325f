//! Generation - procedural creation of the block and its population

mod block;
mod names;

pub use block::*;
pub use names::*;
