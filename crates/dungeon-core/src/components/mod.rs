//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems and spawnables.

mod common;
mod dungeon;
mod spawner;
mod traps;

pub use common::*;
pub use dungeon::*;
pub use spawner::*;
pub use traps::*;
