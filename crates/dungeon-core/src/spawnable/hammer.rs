//! Swinging hammer - swings left, swings right, rests one tick, repeats.

use hecs::{Entity, World};

use super::{
    deal_damage, despawn_spawned, live_entity, load_state, spawn_trap_model, store_state,
    targets_in_box, Spawnable,
};
use crate::components::*;
use crate::engine::DungeonCtx;
use crate::services::DamageEvent;
use crate::systems::position_of;

pub const HAMMER_ID: &str = "hammer";

const HAMMER_MODEL: &str = "CM_Big_Hammer";
const ANIM_IDLE: &str = "Hammer_Idle";
const ANIM_SWING_L: &str = "Hammer_Swing_L";
const ANIM_SWING_R: &str = "Hammer_Swing_R";

pub struct HammerTrap;

impl HammerTrap {
    /// Box swept by the hammer head around `position`
    pub fn damage_zone(state: &HammerState, position: Vec3) -> BoundingBox {
        let (x_half, z_half) = match state.knockback_axis {
            TrapAxis::X => (state.damage_zone_width / 2.0, state.damage_zone_depth / 2.0),
            TrapAxis::Z => (state.damage_zone_depth / 2.0, state.damage_zone_width / 2.0),
        };
        let bottom = position.y + state.damage_zone_offset_y;
        BoundingBox::new(
            Vec3::new(position.x - x_half, bottom, position.z - z_half),
            Vec3::new(
                position.x + x_half,
                bottom + state.damage_zone_height,
                position.z + z_half,
            ),
        )
    }

    fn knockback(state: &HammerState, sign: f32) -> Vec3 {
        let push = sign * state.knockback_horizontal;
        match state.knockback_axis {
            TrapAxis::X => Vec3::new(push, state.knockback_y, 0.0),
            TrapAxis::Z => Vec3::new(0.0, state.knockback_y, push),
        }
    }

    fn smash(ctx: &mut DungeonCtx<'_>, spawner: Entity, model: Entity, state: &HammerState) {
        let Some(position) = position_of(ctx.world, model) else {
            return;
        };
        let zone = Self::damage_zone(state, position);
        let targets = targets_in_box(
            ctx.world,
            ctx.services.spatial.as_ref(),
            &zone,
            &[spawner, model],
        );
        let knockback = Self::knockback(state, state.phase.knockback_sign());
        for target in targets {
            deal_damage(
                ctx,
                target,
                DamageEvent {
                    amount: state.damage,
                    source: HAMMER_ID,
                    knockback: Some(knockback),
                },
            );
        }
    }

    fn start_swing(ctx: &mut DungeonCtx<'_>, model: Entity, state: &mut HammerState, phase: HammerPhase) {
        state.set_phase(phase);
        let clip = if phase == HammerPhase::SwingLeft {
            ANIM_SWING_L
        } else {
            ANIM_SWING_R
        };
        ctx.services
            .animation
            .play(ctx.world, model, AnimationSlot::Action, clip, true);
    }
}

impl Spawnable for HammerTrap {
    fn id(&self) -> &'static str {
        HAMMER_ID
    }

    fn register(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if let Ok(mut existing) = ctx.world.get::<&mut HammerState>(spawner) {
            existing.reset();
            return;
        }
        store_state(ctx.world, spawner, HammerState::default());
    }

    fn activate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if !ctx.world.contains(spawner) {
            return;
        }
        if ctx.world.get::<&HammerState>(spawner).is_err() {
            self.register(ctx, spawner);
        }
        let Some(mut state) = load_state::<HammerState>(ctx.world, spawner) else {
            return;
        };

        if live_entity(ctx.world, state.spawned).is_none() {
            let Some(position) = position_of(ctx.world, spawner) else {
                log::warn!("Hammer spawner {:?} has no position", spawner);
                return;
            };
            let model = spawn_trap_model(ctx.world, spawner, HAMMER_MODEL, position);
            state.spawned = Some(model);
            state.set_phase(HammerPhase::Idle);
            ctx.services
                .animation
                .play(ctx.world, model, AnimationSlot::Action, ANIM_IDLE, true);
        }
        state.active = true;
        state.pending_deactivation = false;
        store_state(ctx.world, spawner, state);
    }

    fn deactivate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        let Some(mut state) = load_state::<HammerState>(ctx.world, spawner) else {
            return;
        };
        if !state.active {
            return;
        }
        state.pending_deactivation = true;
        if let Some(model) = live_entity(ctx.world, state.spawned) {
            ctx.services
                .animation
                .play(ctx.world, model, AnimationSlot::Action, ANIM_IDLE, true);
        }
        store_state(ctx.world, spawner, state);
    }

    fn cleanup(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if let Ok(state) = ctx.world.remove_one::<HammerState>(spawner) {
            despawn_spawned(ctx.world, state.spawned);
        }
    }

    fn tick(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity, dt: f32) {
        let Some(mut state) = load_state::<HammerState>(ctx.world, spawner) else {
            return;
        };
        if !state.active {
            return;
        }
        let Some(model) = live_entity(ctx.world, state.spawned) else {
            return;
        };

        state.phase_timer += dt;
        match state.phase {
            HammerPhase::Idle => {
                if state.pending_deactivation {
                    state.active = false;
                    state.pending_deactivation = false;
                    ctx.services
                        .animation
                        .play(ctx.world, model, AnimationSlot::Action, ANIM_IDLE, true);
                } else {
                    Self::start_swing(ctx, model, &mut state, HammerPhase::SwingLeft);
                }
            }
            HammerPhase::SwingLeft | HammerPhase::SwingRight => {
                if !state.has_damaged_this_swing && state.phase_timer >= state.damage_delay {
                    Self::smash(ctx, spawner, model, &state);
                    state.has_damaged_this_swing = true;
                }
                if state.phase_timer >= state.swing_duration {
                    if state.phase == HammerPhase::SwingLeft {
                        Self::start_swing(ctx, model, &mut state, HammerPhase::SwingRight);
                    } else {
                        state.set_phase(HammerPhase::Idle);
                    }
                }
            }
        }
        store_state(ctx.world, spawner, state);
    }

    fn is_running(&self, world: &World, spawner: Entity) -> bool {
        world
            .get::<&HammerState>(spawner)
            .map(|s| s.active)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DungeonEngine;

    fn setup() -> (DungeonEngine, Entity) {
        let mut engine = DungeonEngine::with_seed(3);
        let spawner = engine
            .world
            .spawn((Position::new(0.0, 0.0, 0.0), Spawner::new(HAMMER_ID)));
        (engine, spawner)
    }

    #[test]
    fn test_zone_follows_axis() {
        let state = HammerState::default();
        let zone = HammerTrap::damage_zone(&state, Vec3::ZERO);
        assert_eq!(zone.max.x - zone.min.x, 6.0);
        assert_eq!(zone.max.z - zone.min.z, 2.0);
        assert_eq!(zone.max.y - zone.min.y, 3.0);

        let state = HammerState {
            knockback_axis: TrapAxis::Z,
            ..Default::default()
        };
        let zone = HammerTrap::damage_zone(&state, Vec3::ZERO);
        assert_eq!(zone.max.x - zone.min.x, 2.0);
        assert_eq!(zone.max.z - zone.min.z, 6.0);
    }

    #[test]
    fn test_swings_alternate_knockback() {
        let (mut engine, spawner) = setup();
        let victim = engine
            .world
            .spawn((Position::new(1.0, 0.5, 0.0), Health::new(200.0)));
        let mut ctx = engine.ctx();
        HammerTrap.activate(&mut ctx, spawner);

        HammerTrap.tick(&mut ctx, spawner, 0.1);
        assert_eq!(
            ctx.world.get::<&HammerState>(spawner).unwrap().phase,
            HammerPhase::SwingLeft
        );
        HammerTrap.tick(&mut ctx, spawner, 0.5);
        assert_eq!(ctx.world.get::<&Health>(victim).unwrap().current, 125.0);
        assert!(ctx.world.get::<&Velocity>(victim).unwrap().0.x > 0.0);

        HammerTrap.tick(&mut ctx, spawner, 0.5);
        assert_eq!(
            ctx.world.get::<&HammerState>(spawner).unwrap().phase,
            HammerPhase::SwingRight
        );
        HammerTrap.tick(&mut ctx, spawner, 0.5);
        assert_eq!(ctx.world.get::<&Health>(victim).unwrap().current, 50.0);
        assert!(ctx.world.get::<&Velocity>(victim).unwrap().0.x < 0.0);
    }

    #[test]
    fn test_deactivate_finishes_swing_first() {
        let (mut engine, spawner) = setup();
        let mut ctx = engine.ctx();
        HammerTrap.activate(&mut ctx, spawner);
        HammerTrap.tick(&mut ctx, spawner, 0.1);
        HammerTrap.deactivate(&mut ctx, spawner);

        HammerTrap.tick(&mut ctx, spawner, 1.0);
        HammerTrap.tick(&mut ctx, spawner, 1.0);
        assert!(HammerTrap.is_running(ctx.world, spawner));

        HammerTrap.tick(&mut ctx, spawner, 0.1);
        assert!(!HammerTrap.is_running(ctx.world, spawner));
        let state = load_state::<HammerState>(ctx.world, spawner).unwrap();
        assert_eq!(state.phase, HammerPhase::Idle);
        let model = state.spawned.unwrap();
        let playing = ctx.world.get::<&PlayingAnimation>(model).unwrap();
        assert_eq!(playing.clip_name(AnimationSlot::Action), Some(ANIM_IDLE));
    }
}
