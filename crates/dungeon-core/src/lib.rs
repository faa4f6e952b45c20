//! Dungeon Core - spatially discovered dungeon networks
//!
//! A controller entity placed in the world becomes a dungeon network: it
//! discovers the trap and monster spawners around it by flood fill, claims the
//! players who walk into its boss room, arms every spawner when the encounter
//! starts and winds them down again when the relic holder escapes, dies or
//! disconnects.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Network controllers, spawners, entrances, players, spawned traps
//! - **Components**: Pure data attached to entities (Position, DungeonNetwork, Spawner, etc.)
//! - **Systems**: Free functions over a borrowed [`engine::DungeonCtx`]
//! - **Spawnables**: Per-spawner trap behaviors selected by execution id
//!
//! # Example
//!
//! ```rust,no_run
//! use dungeon_core::prelude::*;
//!
//! let mut engine = DungeonEngine::new();
//! engine.world.spawn((Position::new(0.0, 64.0, 0.0), DungeonNetwork::new("crypt")));
//! engine.world.spawn((Position::new(6.0, 64.0, 0.0), Spawner::new("hammer")));
//!
//! loop {
//!     engine.update(1.0 / 20.0); // 20 ticks per second
//! }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod persistence;
pub mod services;
pub mod spawnable;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::DungeonConfig;
    pub use crate::engine::{DungeonCtx, DungeonEngine};
    pub use crate::services::Services;
    pub use crate::spawnable::{Spawnable, SpawnableRegistry};
}
