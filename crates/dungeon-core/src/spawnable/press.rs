//! Hydraulic press - slams down, retracts, rests a random while, repeats.

use hecs::{Entity, World};
use rand::Rng;

use super::{
    deal_damage, despawn_spawned, live_entity, load_state, spawn_trap_model, store_state,
    targets_in_radius, Spawnable,
};
use crate::components::*;
use crate::engine::DungeonCtx;
use crate::services::DamageEvent;
use crate::systems::position_of;

pub const PRESS_ID: &str = "hydraulic_press";

const PRESS_MODEL: &str = "CM_Hydraulic_Press";
const ANIM_PRESS: &str = "Press";
const ANIM_RELEASE: &str = "Release";
const ANIM_IDLE: &str = "Idle";

pub struct HydraulicPressTrap;

impl HydraulicPressTrap {
    fn finish_deactivation(ctx: &mut DungeonCtx<'_>, state: &mut PressState) {
        despawn_spawned(ctx.world, state.spawned.take());
        state.active = false;
        state.pending_deactivation = false;
        state.set_phase(PressPhase::Idle);
        log::debug!("Hydraulic press wound down");
    }

    fn draw_cooldown(ctx: &mut DungeonCtx<'_>, state: &PressState) -> f32 {
        if state.cooldown_max > state.cooldown_min {
            ctx.rng.gen_range(state.cooldown_min..=state.cooldown_max)
        } else {
            state.cooldown_min
        }
    }

    fn slam(ctx: &mut DungeonCtx<'_>, spawner: Entity, model: Entity, state: &PressState) {
        let Some(center) = position_of(ctx.world, model) else {
            return;
        };
        let targets = targets_in_radius(
            ctx.world,
            ctx.services.spatial.as_ref(),
            center,
            state.damage_radius,
            &[spawner, model],
        );
        for target in targets {
            let away = position_of(ctx.world, target)
                .map(|p| Vec3::new(p.x - center.x, 0.0, p.z - center.z).normalize())
                .unwrap_or(Vec3::ZERO);
            let knockback = Vec3::new(
                away.x * state.knockback_horizontal,
                state.knockback_y,
                away.z * state.knockback_horizontal,
            ) * state.velocity_multiplier;
            deal_damage(
                ctx,
                target,
                DamageEvent {
                    amount: state.damage,
                    source: PRESS_ID,
                    knockback: Some(knockback),
                },
            );
        }
    }
}

impl Spawnable for HydraulicPressTrap {
    fn id(&self) -> &'static str {
        PRESS_ID
    }

    fn register(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if let Ok(mut existing) = ctx.world.get::<&mut PressState>(spawner) {
            existing.reset();
            return;
        }
        store_state(ctx.world, spawner, PressState::default());
    }

    fn activate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if !ctx.world.contains(spawner) {
            log::warn!("Cannot activate press: spawner is gone");
            return;
        }
        if ctx.world.get::<&PressState>(spawner).is_err() {
            self.register(ctx, spawner);
        }
        let Some(mut state) = load_state::<PressState>(ctx.world, spawner) else {
            return;
        };
        state.pending_deactivation = false;

        if live_entity(ctx.world, state.spawned).is_none() {
            let Some(position) = position_of(ctx.world, spawner) else {
                log::warn!("Press spawner {:?} has no position", spawner);
                return;
            };
            state.spawned = Some(spawn_trap_model(ctx.world, spawner, PRESS_MODEL, position));
            state.reset();
        }
        state.active = true;
        store_state(ctx.world, spawner, state);
    }

    fn deactivate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        let Some(mut state) = load_state::<PressState>(ctx.world, spawner) else {
            return;
        };
        if !state.active {
            return;
        }
        if state.phase == PressPhase::Idle {
            Self::finish_deactivation(ctx, &mut state);
        } else {
            state.pending_deactivation = true;
        }
        store_state(ctx.world, spawner, state);
    }

    fn cleanup(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        if let Ok(state) = ctx.world.remove_one::<PressState>(spawner) {
            despawn_spawned(ctx.world, state.spawned);
        }
    }

    fn tick(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity, dt: f32) {
        let Some(mut state) = load_state::<PressState>(ctx.world, spawner) else {
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
            PressPhase::Idle => {
                if state.pending_deactivation {
                    Self::finish_deactivation(ctx, &mut state);
                } else {
                    state.set_phase(PressPhase::Pressing);
                    state.has_damaged_this_cycle = false;
                    ctx.services
                        .animation
                        .play(ctx.world, model, AnimationSlot::Action, ANIM_PRESS, true);
                }
            }
            PressPhase::Pressing => {
                if !state.has_damaged_this_cycle && state.phase_timer >= state.damage_delay {
                    Self::slam(ctx, spawner, model, &state);
                    state.has_damaged_this_cycle = true;
                }
                if state.phase_timer >= state.press_duration {
                    state.set_phase(PressPhase::Retracting);
                    ctx.services
                        .animation
                        .play(ctx.world, model, AnimationSlot::Action, ANIM_RELEASE, true);
                }
            }
            PressPhase::Retracting => {
                if state.phase_timer >= state.retract_duration {
                    state.set_phase(PressPhase::Cooldown);
                    state.current_cooldown = Self::draw_cooldown(ctx, &state);
                    ctx.services
                        .animation
                        .play(ctx.world, model, AnimationSlot::Action, ANIM_IDLE, true);
                }
            }
            PressPhase::Cooldown => {
                if state.phase_timer >= state.current_cooldown {
                    state.set_phase(PressPhase::Idle);
                }
            }
        }
        store_state(ctx.world, spawner, state);
    }

    fn is_running(&self, world: &World, spawner: Entity) -> bool {
        world
            .get::<&PressState>(spawner)
            .map(|s| s.active)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DungeonEngine;

    fn setup() -> (DungeonEngine, Entity, Entity) {
        let mut engine = DungeonEngine::with_seed(7);
        let spawner = engine
            .world
            .spawn((Position::new(0.0, 0.0, 0.0), Spawner::new(PRESS_ID)));
        let victim = engine
            .world
            .spawn((Position::new(1.0, 0.0, 0.0), Health::new(100.0), Player::new("ana")));
        (engine, spawner, victim)
    }

    #[test]
    fn test_register_is_idempotent() {
        let (mut engine, spawner, _) = setup();
        let mut ctx = engine.ctx();
        HydraulicPressTrap.register(&mut ctx, spawner);
        ctx.world.get::<&mut PressState>(spawner).unwrap().phase_timer = 1.5;
        HydraulicPressTrap.register(&mut ctx, spawner);

        let state = ctx.world.get::<&PressState>(spawner).unwrap();
        assert_eq!(state.phase_timer, 0.0);
        assert_eq!(state.phase, PressPhase::Idle);
    }

    #[test]
    fn test_activate_spawns_model() {
        let (mut engine, spawner, _) = setup();
        let mut ctx = engine.ctx();
        HydraulicPressTrap.activate(&mut ctx, spawner);

        let state = load_state::<PressState>(ctx.world, spawner).unwrap();
        assert!(state.active);
        let model = state.spawned.unwrap();
        assert!(ctx.world.get::<&SpawnedEntity>(model).is_ok());
    }

    #[test]
    fn test_damage_once_per_press() {
        let (mut engine, spawner, victim) = setup();
        let mut ctx = engine.ctx();
        HydraulicPressTrap.activate(&mut ctx, spawner);

        // First tick leaves idle and starts pressing
        HydraulicPressTrap.tick(&mut ctx, spawner, 0.05);
        let mut hits = 0;
        let mut last_health = 100.0;
        for _ in 0..60 {
            HydraulicPressTrap.tick(&mut ctx, spawner, 0.05);
            let health = ctx.world.get::<&Health>(victim).unwrap().current;
            if health < last_health {
                hits += 1;
                last_health = health;
            }
        }
        // 3.0s into the press
        assert_eq!(hits, 1);
        assert_eq!(last_health, 75.0);
    }

    #[test]
    fn test_cooldown_drawn_within_bounds() {
        let (mut engine, spawner, _) = setup();
        let mut ctx = engine.ctx();
        HydraulicPressTrap.activate(&mut ctx, spawner);
        HydraulicPressTrap.tick(&mut ctx, spawner, 0.01);
        HydraulicPressTrap.tick(&mut ctx, spawner, 3.1);
        HydraulicPressTrap.tick(&mut ctx, spawner, 3.1);

        let state = load_state::<PressState>(ctx.world, spawner).unwrap();
        assert_eq!(state.phase, PressPhase::Cooldown);
        assert!(state.current_cooldown >= 0.0 && state.current_cooldown <= 2.0);
    }

    #[test]
    fn test_deactivate_waits_for_idle() {
        let (mut engine, spawner, _) = setup();
        let mut ctx = engine.ctx();
        HydraulicPressTrap.activate(&mut ctx, spawner);
        HydraulicPressTrap.tick(&mut ctx, spawner, 0.01);
        let model = load_state::<PressState>(ctx.world, spawner).unwrap().spawned.unwrap();

        HydraulicPressTrap.deactivate(&mut ctx, spawner);
        let state = load_state::<PressState>(ctx.world, spawner).unwrap();
        assert!(state.active);
        assert!(state.pending_deactivation);
        assert!(ctx.world.contains(model));

        // Press, retract, longest cooldown, then idle honors the request
        for _ in 0..100 {
            HydraulicPressTrap.tick(&mut ctx, spawner, 0.1);
        }
        let state = load_state::<PressState>(ctx.world, spawner).unwrap();
        assert!(!state.active);
        assert!(!state.pending_deactivation);
        assert!(!ctx.world.contains(model));
    }

    #[test]
    fn test_cleanup_removes_state_and_model() {
        let (mut engine, spawner, _) = setup();
        let mut ctx = engine.ctx();
        HydraulicPressTrap.activate(&mut ctx, spawner);
        let model = load_state::<PressState>(ctx.world, spawner).unwrap().spawned.unwrap();

        HydraulicPressTrap.cleanup(&mut ctx, spawner);
        assert!(ctx.world.get::<&PressState>(spawner).is_err());
        assert!(!ctx.world.contains(model));
    }
}
