//! External collaborators - spatial queries, damage, animation, respawn
//! points and block state.
//!
//! The core only talks to the game through these traits. Each has a default
//! implementation that works purely on the [`World`], used by the engine
//! out of the box and by the tests.

use std::collections::HashMap;

use hecs::{Entity, World};

use crate::components::*;

/// Returns entities near a point
pub trait SpatialIndex {
    fn collect(&self, world: &World, center: Vec3, radius: f32) -> Vec<Entity>;
}

/// Linear scan over every entity with a [`Position`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionScan;

impl SpatialIndex for PositionScan {
    fn collect(&self, world: &World, center: Vec3, radius: f32) -> Vec<Entity> {
        let radius_sq = radius * radius;
        world
            .query::<&Position>()
            .iter()
            .filter(|(_, pos)| pos.0.distance_squared(&center) <= radius_sq)
            .map(|(entity, _)| entity)
            .collect()
    }
}

/// One hit dealt by a trap
#[derive(Debug, Clone, PartialEq)]
pub struct DamageEvent {
    pub amount: f32,
    /// Behavior id of the trap that dealt it
    pub source: &'static str,
    /// Velocity to set on the target, if the hit knocks back
    pub knockback: Option<Vec3>,
}

/// Applies damage to entities
pub trait DamageApi {
    fn apply(&mut self, world: &mut World, target: Entity, damage: DamageEvent);
}

/// Subtracts from [`Health`] and sets [`Velocity`] on knockback
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthDamage;

impl DamageApi for HealthDamage {
    fn apply(&mut self, world: &mut World, target: Entity, damage: DamageEvent) {
        if let Ok(mut health) = world.get::<&mut Health>(target) {
            health.current = (health.current - damage.amount).max(0.0);
        } else {
            return;
        }
        if let Some(knockback) = damage.knockback {
            let _ = world.insert_one(target, Velocity(knockback));
        }
    }
}

/// Plays and stops animation clips
pub trait AnimationApi {
    fn play(&mut self, world: &mut World, target: Entity, slot: AnimationSlot, clip: &str, looping: bool);
    fn stop(&mut self, world: &mut World, target: Entity, slot: AnimationSlot);
}

/// Records the playing clips in a [`PlayingAnimation`] component
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentAnimator;

impl AnimationApi for ComponentAnimator {
    fn play(&mut self, world: &mut World, target: Entity, slot: AnimationSlot, clip: &str, looping: bool) {
        if !world.contains(target) {
            return;
        }
        let clip = AnimationClip {
            name: clip.to_string(),
            looping,
        };
        if let Ok(mut playing) = world.get::<&mut PlayingAnimation>(target) {
            *playing.slot_mut(slot) = Some(clip);
            return;
        }
        let mut playing = PlayingAnimation::default();
        *playing.slot_mut(slot) = Some(clip);
        let _ = world.insert_one(target, playing);
    }

    fn stop(&mut self, world: &mut World, target: Entity, slot: AnimationSlot) {
        if let Ok(mut playing) = world.get::<&mut PlayingAnimation>(target) {
            *playing.slot_mut(slot) = None;
        }
    }
}

/// Reads and replaces a player's respawn points
pub trait PlayerRespawnApi {
    fn respawn_points(&self, world: &World, player: Entity) -> Vec<Vec3>;
    fn set_respawn_points(&mut self, world: &mut World, player: Entity, points: Vec<Vec3>);
}

/// Keeps respawn points in a [`RespawnPoints`] component
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentRespawns;

impl PlayerRespawnApi for ComponentRespawns {
    fn respawn_points(&self, world: &World, player: Entity) -> Vec<Vec3> {
        world
            .get::<&RespawnPoints>(player)
            .map(|points| points.0.clone())
            .unwrap_or_default()
    }

    fn set_respawn_points(&mut self, world: &mut World, player: Entity, points: Vec<Vec3>) {
        let _ = world.insert_one(player, RespawnPoints(points));
    }
}

/// Reads and switches world blocks between state variants
pub trait BlockStateApi {
    fn set_state(&mut self, pos: BlockPos, base_block_id: &str, state: &str);
    fn state_at(&self, pos: BlockPos) -> Option<&str>;
    /// Dungeon blocks inside the cube of half-size `radius` around `center`,
    /// reported by base block id
    fn dungeon_blocks_near(&self, center: Vec3, radius: f32) -> Vec<DungeonBlockEntry>;
}

/// In-memory block table: base block id and current state per position
#[derive(Debug, Clone, Default)]
pub struct BlockStateMap {
    states: HashMap<BlockPos, (String, String)>,
}

impl BlockStateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a block by its world id. State variants (`*CM_Torch_On`) are
    /// split into base id and state.
    pub fn place(&mut self, pos: BlockPos, block_id: &str) {
        let base = base_block_id(block_id);
        let state = block_id
            .strip_prefix('*')
            .and_then(|variant| variant.strip_prefix(base))
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(BLOCK_STATE_INACTIVE);
        self.states
            .insert(pos, (base.to_string(), state.to_string()));
    }

    /// Base block id last written at `pos`
    pub fn block_at(&self, pos: BlockPos) -> Option<&str> {
        self.states.get(&pos).map(|(block, _)| block.as_str())
    }
}

impl BlockStateApi for BlockStateMap {
    fn set_state(&mut self, pos: BlockPos, base_block_id: &str, state: &str) {
        self.states
            .insert(pos, (base_block_id.to_string(), state.to_string()));
    }

    fn state_at(&self, pos: BlockPos) -> Option<&str> {
        self.states.get(&pos).map(|(_, state)| state.as_str())
    }

    fn dungeon_blocks_near(&self, center: Vec3, radius: f32) -> Vec<DungeonBlockEntry> {
        let within = |value: i32, around: f32| (value as f32 - around).abs() <= radius;
        let mut found: Vec<DungeonBlockEntry> = self
            .states
            .iter()
            .filter(|(pos, (block, _))| {
                is_dungeon_block(block)
                    && within(pos.x, center.x)
                    && within(pos.y, center.y)
                    && within(pos.z, center.z)
            })
            .map(|(pos, (block, _))| DungeonBlockEntry::new(pos.x, pos.y, pos.z, block.as_str()))
            .collect();
        found.sort_by_key(|b| (b.x, b.y, b.z));
        found
    }
}

/// All collaborators the engine hands to systems and spawnables
pub struct Services {
    pub spatial: Box<dyn SpatialIndex>,
    pub damage: Box<dyn DamageApi>,
    pub animation: Box<dyn AnimationApi>,
    pub respawn: Box<dyn PlayerRespawnApi>,
    pub blocks: Box<dyn BlockStateApi>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            spatial: Box::new(PositionScan),
            damage: Box::new(HealthDamage),
            animation: Box::new(ComponentAnimator),
            respawn: Box::new(ComponentRespawns),
            blocks: Box::new(BlockStateMap::new()),
        }
    }
}

impl Services {
    pub fn with_spatial(mut self, spatial: impl SpatialIndex + 'static) -> Self {
        self.spatial = Box::new(spatial);
        self
    }

    pub fn with_damage(mut self, damage: impl DamageApi + 'static) -> Self {
        self.damage = Box::new(damage);
        self
    }

    pub fn with_animation(mut self, animation: impl AnimationApi + 'static) -> Self {
        self.animation = Box::new(animation);
        self
    }

    pub fn with_respawn(mut self, respawn: impl PlayerRespawnApi + 'static) -> Self {
        self.respawn = Box::new(respawn);
        self
    }

    pub fn with_blocks(mut self, blocks: impl BlockStateApi + 'static) -> Self {
        self.blocks = Box::new(blocks);
        self
    }
}
