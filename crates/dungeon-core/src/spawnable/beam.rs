//! Continuous beam - damages everything its ray crosses every short interval.

use hecs::{Entity, World};

use super::laser::{laser_running, register_laser_state, set_laser_active};
use super::{deal_damage, load_state, store_state, Spawnable};
use crate::components::*;
use crate::engine::DungeonCtx;
use crate::services::DamageEvent;
use crate::systems::position_of;

pub const BEAM_ID: &str = "beam";

pub const MAX_BEAM_DISTANCE: f32 = 64.0;
const BEAM_FIRE_INTERVAL: f32 = 0.25;
const BEAM_DAMAGE_MULTIPLIER: f32 = 1.15;

pub struct BeamTrap;

impl BeamTrap {
    /// Entities whose hitbox the beam enters within its length
    pub fn entities_on_beam(world: &World, spawner: Entity, origin: Vec3, direction: Vec3) -> Vec<Entity> {
        let mut hits = Vec::new();
        for (entity, (position, health, hitbox)) in world
            .query::<(&Position, &Health, Option<&Hitbox>)>()
            .iter()
        {
            if entity == spawner || health.is_dead() {
                continue;
            }
            let bounds = hitbox.copied().unwrap_or_default().at(position.0);
            if let Some(t) = bounds.ray_entry(origin, direction) {
                if t <= MAX_BEAM_DISTANCE {
                    hits.push(entity);
                }
            }
        }
        hits
    }
}

impl Spawnable for BeamTrap {
    fn id(&self) -> &'static str {
        BEAM_ID
    }

    fn register(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        register_laser_state(ctx, spawner, BEAM_FIRE_INTERVAL);
    }

    fn activate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if !ctx.world.contains(spawner) {
            return;
        }
        if ctx.world.get::<&LaserState>(spawner).is_err() {
            self.register(ctx, spawner);
        }
        set_laser_active(ctx, spawner, true);
        log::info!("Beam trap {:?} activated", spawner);
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
        let Some(base) = position_of(ctx.world, spawner) else {
            return;
        };

        state.fire_timer += dt;
        if state.fire_timer >= state.fire_interval {
            let origin = base + Vec3::new(state.offset_x, state.offset_y, state.offset_z);
            let direction = Vec3::from_pitch_yaw(state.pitch, state.yaw);
            for target in Self::entities_on_beam(ctx.world, spawner, origin, direction) {
                deal_damage(
                    ctx,
                    target,
                    DamageEvent {
                        amount: state.damage * BEAM_DAMAGE_MULTIPLIER,
                        source: BEAM_ID,
                        knockback: None,
                    },
                );
            }
            state.fire_timer = 0.0;
        }
        store_state(ctx.world, spawner, state);
    }

    fn is_running(&self, world: &World, spawner: Entity) -> bool {
        laser_running(world, spawner)
    }
}
