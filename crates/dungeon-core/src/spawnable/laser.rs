//! Laser turret - fires a projectile every interval along its configured aim.

use hecs::{Entity, World};

use super::{load_state, store_state, Spawnable};
use crate::components::*;
use crate::engine::DungeonCtx;
use crate::systems::position_of;

pub const LASER_ID: &str = "laser";

pub struct LaserTrap;

impl LaserTrap {
    fn fire(ctx: &mut DungeonCtx<'_>, spawner: Entity, state: &LaserState) -> Option<Entity> {
        let base = position_of(ctx.world, spawner)?;
        let origin = base + Vec3::new(state.offset_x, state.offset_y, state.offset_z);
        let direction = Vec3::from_pitch_yaw(state.pitch, state.yaw);
        let projectile = ctx.world.spawn((
            Position(origin),
            Projectile {
                asset_id: state.projectile_id.clone(),
                direction,
            },
            SpawnedEntity { spawner },
        ));
        log::debug!(
            "Fired {} at ({:.1}, {:.1}, {:.1}) yaw={:.1} pitch={:.1}",
            state.projectile_id,
            origin.x,
            origin.y,
            origin.z,
            state.yaw,
            state.pitch
        );
        Some(projectile)
    }
}

/// Shared registration for the laser-family traps
pub(crate) fn register_laser_state(ctx: &mut DungeonCtx<'_>, spawner: Entity, fire_interval: f32) {
    if let Ok(mut existing) = ctx.world.get::<&mut LaserState>(spawner) {
        existing.reset();
        return;
    }
    store_state(ctx.world, spawner, LaserState::with_interval(fire_interval));
}

pub(crate) fn set_laser_active(ctx: &mut DungeonCtx<'_>, spawner: Entity, active: bool) {
    if let Ok(mut state) = ctx.world.get::<&mut LaserState>(spawner) {
        state.active = active;
        state.fire_timer = 0.0;
    }
}

pub(crate) fn laser_running(world: &World, spawner: Entity) -> bool {
    world
        .get::<&LaserState>(spawner)
        .map(|s| s.active)
        .unwrap_or(false)
}

impl Spawnable for LaserTrap {
    fn id(&self) -> &'static str {
        LASER_ID
    }

    fn register(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        register_laser_state(ctx, spawner, LaserState::default().fire_interval);
    }

    fn activate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if !ctx.world.contains(spawner) {
            return;
        }
        if ctx.world.get::<&LaserState>(spawner).is_err() {
            self.register(ctx, spawner);
        }
        set_laser_active(ctx, spawner, true);
        log::info!("Laser trap {:?} activated", spawner);
    }

    fn deactivate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        set_laser_active(ctx, spawner, false);
    }

    fn cleanup(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        let _ = ctx.world.remove_one::<LaserState>(spawner);
    }

    fn tick(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity, dt: f32) {
        let Some(mut state) = load_state::<LaserState>(ctx.world, spawner) else {
            return;
        };
        if !state.active {
            return;
        }
        state.fire_timer += dt;
        if state.fire_timer >= state.fire_interval {
            if Self::fire(ctx, spawner, &state).is_none() {
                log::warn!("Laser spawner {:?} has no position, cannot fire", spawner);
            }
            state.fire_timer = 0.0;
        }
        store_state(ctx.world, spawner, state);
    }

    fn is_running(&self, world: &World, spawner: Entity) -> bool {
        laser_running(world, spawner)
    }
}
