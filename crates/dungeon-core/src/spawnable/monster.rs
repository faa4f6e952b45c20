//! Monster spawners - one NPC per spawner while the network is active.

use hecs::{Entity, World};

use super::{despawn_spawned, live_entity, load_state, store_state, Spawnable};
use crate::components::*;
use crate::engine::DungeonCtx;
use crate::systems::position_of;

pub const ARCHER_ID: &str = "archer";
pub const BRUTE_ID: &str = "brute";

/// Spawns a single NPC of `role` at the spawner
pub struct MonsterSpawner {
    id: &'static str,
    role: &'static str,
    health: f32,
}

impl MonsterSpawner {
    pub fn new(id: &'static str, role: &'static str, health: f32) -> Self {
        Self { id, role, health }
    }

    pub fn archer() -> Self {
        Self::new(ARCHER_ID, "Skeleton_Archer", 60.0)
    }

    pub fn brute() -> Self {
        Self::new(BRUTE_ID, "Skeleton_Brute", 150.0)
    }

    pub fn role(&self) -> &'static str {
        self.role
    }
}

impl Spawnable for MonsterSpawner {
    fn id(&self) -> &'static str {
        self.id
    }

    fn register(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if let Ok(mut existing) = ctx.world.get::<&mut MonsterState>(spawner) {
            existing.reset();
            return;
        }
        store_state(ctx.world, spawner, MonsterState::default());
    }

    fn activate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if !ctx.world.contains(spawner) {
            log::warn!("Cannot spawn {}: spawner is gone", self.role);
            return;
        }
        if ctx.world.get::<&MonsterState>(spawner).is_err() {
            self.register(ctx, spawner);
        }
        let Some(mut state) = load_state::<MonsterState>(ctx.world, spawner) else {
            return;
        };
        if live_entity(ctx.world, state.spawned).is_some() {
            log::debug!("{} already spawned", self.role);
            return;
        }
        let Some(position) = position_of(ctx.world, spawner) else {
            log::warn!("Monster spawner {:?} has no position", spawner);
            return;
        };

        let npc = ctx.world.spawn((
            Position(position),
            Npc {
                role: self.role.to_string(),
            },
            Health::new(self.health),
            SpawnedEntity { spawner },
        ));
        state.spawned = Some(npc);
        state.active = true;
        store_state(ctx.world, spawner, state);
        log::info!(
            "Spawned {} at ({:.1}, {:.1}, {:.1})",
            self.role,
            position.x,
            position.y,
            position.z
        );
    }

    fn deactivate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        let Some(mut state) = load_state::<MonsterState>(ctx.world, spawner) else {
            return;
        };
        if state.spawned.is_some() {
            despawn_spawned(ctx.world, state.spawned.take());
            log::info!("Despawned {}", self.role);
        }
        state.active = false;
        store_state(ctx.world, spawner, state);
    }

    fn cleanup(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        self.deactivate(ctx, spawner);
        let _ = ctx.world.remove_one::<MonsterState>(spawner);
    }

    fn tick(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity, _dt: f32) {
        // A killed monster stays dead until the next activation
        if let Ok(mut state) = ctx.world.get::<&mut MonsterState>(spawner) {
            if state.spawned.is_some_and(|npc| !ctx.world.contains(npc)) {
                state.spawned = None;
            }
        }
    }

    fn is_running(&self, world: &World, spawner: Entity) -> bool {
        world
            .get::<&MonsterState>(spawner)
            .map(|s| s.active)
            .unwrap_or(false)
    }
}
