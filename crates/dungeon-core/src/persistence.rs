//! Save/Load functionality for persisting dungeon state
//!
//! Uses bincode for a compact binary snapshot. Only the persisted attributes
//! of each component are written; entity references and runtime flags are
//! skipped and rebuilt by registration after load.

use hecs::{EntityRef, World};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

use crate::components::*;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the dungeon state
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulation time in seconds
    pub sim_time: f64,
    /// All entities with their components
    pub entities: Vec<SerializableEntity>,
}

/// All persisted components for an entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    pub position: Option<Position>,
    pub network: Option<DungeonNetwork>,
    pub entrance: Option<DungeonEntrance>,
    pub spawner: Option<Spawner>,

    // Players
    pub player: Option<Player>,
    pub health: Option<Health>,
    pub dungeoneer: Option<Dungeoneer>,
    pub respawn_points: Option<RespawnPoints>,
}

impl SerializableEntity {
    fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.network.is_none()
            && self.entrance.is_none()
            && self.spawner.is_none()
            && self.player.is_none()
            && self.health.is_none()
            && self.dungeoneer.is_none()
            && self.respawn_points.is_none()
    }
}

fn cloned<T: hecs::Component + Clone>(entity: &EntityRef<'_>) -> Option<T> {
    entity.get::<&T>().map(|c| (*c).clone())
}

/// Extract persisted entities from a world.
///
/// Trap models, projectiles and monsters are recreated by activation and are
/// not written.
fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    world
        .iter()
        .filter(|entity| !entity.has::<SpawnedEntity>())
        .map(|entity| SerializableEntity {
            position: cloned(&entity),
            network: cloned(&entity),
            entrance: cloned(&entity),
            spawner: cloned(&entity),
            player: cloned(&entity),
            health: cloned(&entity),
            dungeoneer: cloned(&entity),
            respawn_points: cloned(&entity),
        })
        .filter(|se| !se.is_empty())
        .collect()
}

/// Spawn an entity with all its components
fn spawn_entity(world: &mut World, se: SerializableEntity) {
    let entity = world.spawn(());

    if let Some(c) = se.position {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.network {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.entrance {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.spawner {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.player {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.health {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.dungeoneer {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = se.respawn_points {
        let _ = world.insert_one(entity, c);
    }
}

/// Save the dungeon world to a writer
pub fn save_world<W: Write>(writer: W, world: &World, sim_time: f64) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        sim_time,
        entities: serialize_entities(world),
    };
    log::debug!("Saving {} entities", save_data.entities.len());
    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a dungeon world from a reader
pub fn load_world<R: Read>(reader: R) -> Result<LoadedWorld, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    let count = save_data.entities.len();
    for se in save_data.entities {
        spawn_entity(&mut world, se);
    }
    log::info!("Loaded {} entities", count);

    Ok(LoadedWorld {
        world,
        sim_time: save_data.sim_time,
    })
}

/// Result of loading a save
pub struct LoadedWorld {
    pub world: World,
    pub sim_time: f64,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}
