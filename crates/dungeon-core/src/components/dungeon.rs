//! Dungeon network components - controller, participants and the entrance.

use std::collections::HashSet;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::Vec3;

/// Block state applied to dungeon blocks while the network is active
pub const BLOCK_STATE_ACTIVE: &str = "On";
/// Block state applied to dungeon blocks while the network is inactive
pub const BLOCK_STATE_INACTIVE: &str = "default";
/// Block ids carrying this prefix belong to a dungeon
pub const DUNGEON_BLOCK_PREFIX: &str = "CM_";

/// `CM_Torch` and its state variants such as `*CM_Torch_On`
pub fn is_dungeon_block(block_id: &str) -> bool {
    block_id
        .strip_prefix('*')
        .unwrap_or(block_id)
        .starts_with(DUNGEON_BLOCK_PREFIX)
}

/// Strip a state variant down to its base block: `*CM_Torch_On` -> `CM_Torch`
pub fn base_block_id(block_id: &str) -> &str {
    let Some(variant) = block_id.strip_prefix('*') else {
        return block_id;
    };
    match variant.rfind('_') {
        Some(split) if split > DUNGEON_BLOCK_PREFIX.len() => &variant[..split],
        _ => variant,
    }
}

/// A world block whose visual state follows the network's activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonBlockEntry {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub base_block_id: String,
}

impl DungeonBlockEntry {
    pub fn new(x: i32, y: i32, z: i32, base_block_id: impl Into<String>) -> Self {
        Self {
            x,
            y,
            z,
            base_block_id: base_block_id.into(),
        }
    }

    pub fn pos(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }
}

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Aggregate root for one dungeon instance, attached to its controller entity.
///
/// Only the id, trigger radius, spawn position, active flag and blocks are
/// persisted. Entity references are rebuilt by registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DungeonNetwork {
    pub dungeon_id: String,
    pub trigger_radius: f32,
    /// Where dungeoneers respawn. Zero means "use the controller position".
    pub spawn_position: Vec3,
    pub active: bool,
    /// Blocks toggled with activation
    pub blocks: Vec<DungeonBlockEntry>,

    /// One-shot trigger already fired
    #[serde(skip)]
    pub triggered: bool,
    /// Discovery has run at least once
    #[serde(skip)]
    pub registered: bool,
    /// A claim started the delayed activation
    #[serde(skip)]
    pub pending_activation: bool,
    /// Seconds left before the pending activation fires
    #[serde(skip)]
    pub activation_delay: Option<f32>,
    #[serde(skip)]
    pub pending_player: Option<Entity>,
    #[serde(skip)]
    pub entrance: Option<Entity>,
    #[serde(skip)]
    pub artifact_holder: Option<Entity>,
    #[serde(skip)]
    spawners: Vec<Entity>,
    #[serde(skip)]
    dungeoneers: Vec<Entity>,
}

impl Default for DungeonNetwork {
    fn default() -> Self {
        Self::new("")
    }
}

impl DungeonNetwork {
    pub fn new(dungeon_id: impl Into<String>) -> Self {
        Self {
            dungeon_id: dungeon_id.into(),
            trigger_radius: 10.0,
            spawn_position: Vec3::ZERO,
            active: false,
            blocks: Vec::new(),
            triggered: false,
            registered: false,
            pending_activation: false,
            activation_delay: None,
            pending_player: None,
            entrance: None,
            artifact_holder: None,
            spawners: Vec::new(),
            dungeoneers: Vec::new(),
        }
    }

    pub fn with_trigger_radius(mut self, radius: f32) -> Self {
        self.trigger_radius = radius;
        self
    }

    pub fn with_spawn_position(mut self, spawn: Vec3) -> Self {
        self.spawn_position = spawn;
        self
    }

    pub fn has_id(&self) -> bool {
        !self.dungeon_id.is_empty()
    }

    /// Spawn position, falling back to the controller's own position when unset
    pub fn spawn_or(&self, controller_position: Vec3) -> Vec3 {
        if self.spawn_position.is_zero() {
            controller_position
        } else {
            self.spawn_position
        }
    }

    pub fn spawners(&self) -> &[Entity] {
        &self.spawners
    }

    pub fn spawner_count(&self) -> usize {
        self.spawners.len()
    }

    /// Returns false when the spawner was already linked
    pub fn add_spawner(&mut self, spawner: Entity) -> bool {
        if self.spawners.contains(&spawner) {
            return false;
        }
        self.spawners.push(spawner);
        true
    }

    pub fn remove_spawner(&mut self, spawner: Entity) {
        self.spawners.retain(|&s| s != spawner);
    }

    pub fn clear_spawners(&mut self) {
        self.spawners.clear();
    }

    pub fn dungeoneers(&self) -> &[Entity] {
        &self.dungeoneers
    }

    pub fn has_dungeoneer(&self, player: Entity) -> bool {
        self.dungeoneers.contains(&player)
    }

    /// Returns false when the player was already tracked
    pub fn add_dungeoneer(&mut self, player: Entity) -> bool {
        if self.dungeoneers.contains(&player) {
            return false;
        }
        self.dungeoneers.push(player);
        true
    }

    pub fn remove_dungeoneer(&mut self, player: Entity) {
        self.dungeoneers.retain(|&p| p != player);
    }

    pub fn clear_dungeoneers(&mut self) {
        self.dungeoneers.clear();
    }

    /// Drop references for which `is_valid` returns false. Returns how many went.
    pub fn retain_dungeoneers(&mut self, mut is_valid: impl FnMut(Entity) -> bool) -> usize {
        let before = self.dungeoneers.len();
        self.dungeoneers.retain(|&p| is_valid(p));
        before - self.dungeoneers.len()
    }

    /// Drop a boss-room activation that has not fired yet
    pub fn cancel_pending_activation(&mut self) {
        self.pending_activation = false;
        self.activation_delay = None;
        self.pending_player = None;
    }

    /// Clear every runtime flag. Registration and the spawner graph stay.
    pub fn reset_runtime(&mut self) {
        self.active = false;
        self.triggered = false;
        self.cancel_pending_activation();
        self.artifact_holder = None;
    }
}

/// Per-player participation record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dungeoneer {
    /// Owning network id, kept by value so it survives reference invalidation
    pub dungeon_id: String,
    pub relic_holder: bool,
    pub spawn_position: Vec3,
    /// Respawn points the player had before entering, restored on exit
    pub original_respawn_points: Vec<Vec3>,
    /// Lookup key for the owning network controller
    #[serde(skip)]
    pub network: Option<Entity>,
}

impl Dungeoneer {
    pub fn new(dungeon_id: impl Into<String>, network: Entity, spawn_position: Vec3) -> Self {
        Self {
            dungeon_id: dungeon_id.into(),
            relic_holder: false,
            spawn_position,
            original_respawn_points: Vec::new(),
            network: Some(network),
        }
    }
}

/// Exit area of a dungeon. Players leaving it while counted as dungeoneers escape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DungeonEntrance {
    pub dungeon_id: String,
    pub trigger_radius: f32,
    #[serde(skip)]
    pub players_inside: HashSet<Entity>,
    #[serde(skip)]
    pub players_inside_last_tick: HashSet<Entity>,
}

impl DungeonEntrance {
    pub fn new(dungeon_id: impl Into<String>) -> Self {
        Self {
            dungeon_id: dungeon_id.into(),
            trigger_radius: 5.0,
            players_inside: HashSet::new(),
            players_inside_last_tick: HashSet::new(),
        }
    }

    pub fn with_trigger_radius(mut self, radius: f32) -> Self {
        self.trigger_radius = radius;
        self
    }

    /// Roll the current inside set over to last tick
    pub fn update_last_tick_tracking(&mut self) {
        self.players_inside_last_tick.clone_from(&self.players_inside);
    }
}
