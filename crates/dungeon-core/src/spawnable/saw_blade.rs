//! Saw blade - rises out of the floor, spins, peeks back down, repeats.

use hecs::{Entity, World};

use super::{
    deal_damage, despawn_spawned, live_entity, load_state, spawn_trap_model, store_state,
    Spawnable,
};
use crate::components::*;
use crate::engine::DungeonCtx;
use crate::services::DamageEvent;
use crate::systems::position_of;

pub const SAW_BLADE_ID: &str = "saw_blade";

const SAW_BLADE_MODEL: &str = "CM_Sawblade";
const ANIM_SPIN: &str = "SawBlade_Spin";
const ANIM_ENTER: &str = "Sawblade_Enter";
const ANIM_EXIT: &str = "Sawblade_Exit";

/// Vertical reach of the blade below and above its hub
const BLADE_REACH_DOWN: f32 = 0.5;
const BLADE_REACH_UP: f32 = 2.0;

pub struct SawBladeTrap;

impl SawBladeTrap {
    fn hide(state: &mut SawBladeState) {
        state.set_phase(SawBladePhase::Hidden);
        state.active = false;
        state.pending_deactivation = false;
    }

    fn cut(ctx: &mut DungeonCtx<'_>, spawner: Entity, blade: Entity, state: &SawBladeState) {
        let Some(center) = position_of(ctx.world, blade) else {
            return;
        };
        let radius_sq = state.damage_radius * state.damage_radius;
        let reach = state.damage_radius + BLADE_REACH_UP;
        let targets: Vec<Entity> = super::targets_in_radius(
            ctx.world,
            ctx.services.spatial.as_ref(),
            center,
            reach,
            &[spawner, blade],
        )
        .into_iter()
        .filter(|&e| {
            position_of(ctx.world, e).is_some_and(|p| {
                p.horizontal_distance_squared(&center) <= radius_sq
                    && p.y >= center.y - BLADE_REACH_DOWN
                    && p.y <= center.y + BLADE_REACH_UP
            })
        })
        .collect();

        for target in targets {
            deal_damage(
                ctx,
                target,
                DamageEvent {
                    amount: state.damage,
                    source: SAW_BLADE_ID,
                    knockback: None,
                },
            );
        }
    }
}

impl Spawnable for SawBladeTrap {
    fn id(&self) -> &'static str {
        SAW_BLADE_ID
    }

    fn register(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if let Ok(mut existing) = ctx.world.get::<&mut SawBladeState>(spawner) {
            existing.reset();
            return;
        }
        store_state(ctx.world, spawner, SawBladeState::default());
    }

    fn activate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if !ctx.world.contains(spawner) {
            return;
        }
        if ctx.world.get::<&SawBladeState>(spawner).is_err() {
            self.register(ctx, spawner);
        }
        let Some(mut state) = load_state::<SawBladeState>(ctx.world, spawner) else {
            return;
        };

        let blade = match live_entity(ctx.world, state.spawned) {
            Some(blade) => blade,
            None => {
                let Some(position) = position_of(ctx.world, spawner) else {
                    log::warn!("Saw blade spawner {:?} has no position", spawner);
                    return;
                };
                let blade = spawn_trap_model(ctx.world, spawner, SAW_BLADE_MODEL, position);
                state.spawned = Some(blade);
                blade
            }
        };

        state.active = true;
        state.pending_deactivation = false;
        state.set_phase(SawBladePhase::Entering);
        ctx.services
            .animation
            .play(ctx.world, blade, AnimationSlot::Movement, ANIM_ENTER, false);
        store_state(ctx.world, spawner, state);
    }

    fn deactivate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        let Some(mut state) = load_state::<SawBladeState>(ctx.world, spawner) else {
            return;
        };
        if !state.active || state.phase == SawBladePhase::Hidden {
            // Nothing is showing, so there is nothing to retract
            Self::hide(&mut state);
        } else {
            state.pending_deactivation = true;
        }
        store_state(ctx.world, spawner, state);
    }

    fn reset(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        let Some(state) = load_state::<SawBladeState>(ctx.world, spawner) else {
            return;
        };
        despawn_spawned(ctx.world, state.spawned);
        let mut fresh = state;
        fresh.spawned = None;
        fresh.reset();
        fresh.active = false;
        store_state(ctx.world, spawner, fresh);
        self.activate(ctx, spawner);
    }

    fn cleanup(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if let Ok(state) = ctx.world.remove_one::<SawBladeState>(spawner) {
            despawn_spawned(ctx.world, state.spawned);
        }
    }

    fn tick(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity, dt: f32) {
        let Some(mut state) = load_state::<SawBladeState>(ctx.world, spawner) else {
            return;
        };
        if !state.active {
            return;
        }
        let Some(blade) = live_entity(ctx.world, state.spawned) else {
            return;
        };

        state.phase_timer += dt;
        match state.phase {
            SawBladePhase::Hidden => {}
            SawBladePhase::Entering => {
                if state.phase_timer >= state.enter_duration {
                    state.set_phase(SawBladePhase::Active);
                    state.last_damage_time = 0.0;
                    ctx.services
                        .animation
                        .play(ctx.world, blade, AnimationSlot::Action, ANIM_SPIN, true);
                }
            }
            SawBladePhase::Active => {
                if state.pending_deactivation {
                    state.set_phase(SawBladePhase::Exiting);
                    ctx.services.animation.stop(ctx.world, blade, AnimationSlot::Action);
                    ctx.services
                        .animation
                        .play(ctx.world, blade, AnimationSlot::Movement, ANIM_EXIT, false);
                } else if state.phase_timer >= state.active_duration {
                    state.set_phase(SawBladePhase::Peeking);
                    ctx.services.animation.stop(ctx.world, blade, AnimationSlot::Action);
                    ctx.services
                        .animation
                        .play(ctx.world, blade, AnimationSlot::Movement, ANIM_EXIT, false);
                } else {
                    state.last_damage_time += dt;
                    if state.last_damage_time >= state.damage_tick_interval {
                        state.last_damage_time = 0.0;
                        Self::cut(ctx, spawner, blade, &state);
                    }
                }
            }
            SawBladePhase::Peeking => {
                if state.pending_deactivation {
                    if state.phase_timer >= state.exit_duration {
                        Self::hide(&mut state);
                    }
                } else if state.phase_timer >= state.peek_duration {
                    state.set_phase(SawBladePhase::Entering);
                    ctx.services
                        .animation
                        .play(ctx.world, blade, AnimationSlot::Movement, ANIM_ENTER, false);
                }
            }
            SawBladePhase::Exiting => {
                if state.phase_timer >= state.exit_duration {
                    Self::hide(&mut state);
                }
            }
        }
        store_state(ctx.world, spawner, state);
    }

    fn is_running(&self, world: &World, spawner: Entity) -> bool {
        world
            .get::<&SawBladeState>(spawner)
            .map(|s| s.active)
            .unwrap_or(false)
    }
}
