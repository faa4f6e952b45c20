//! Boss room - claims players entering a network's trigger radius and drives
//! the delayed activation.

use hecs::Entity;

use super::lifecycle::grant_relic;
use super::{activate, add_dungeoneer, position_of, register, PendingDungeoneerClaims};
use crate::components::*;
use crate::engine::DungeonCtx;

/// Register every network that has a position and has not been registered yet
pub fn registration_system(ctx: &mut DungeonCtx<'_>) {
    let pending: Vec<Entity> = ctx
        .world
        .query::<(&DungeonNetwork, &Position)>()
        .iter()
        .filter(|(_, (network, _))| !network.registered)
        .map(|(entity, _)| entity)
        .collect();

    for network in pending {
        // An earlier registration may have merged this one away
        let still_pending = ctx
            .world
            .get::<&DungeonNetwork>(network)
            .map(|n| !n.registered)
            .unwrap_or(false);
        if still_pending {
            register(ctx, network);
        }
    }
}

/// Per network, in order:
/// - a pending activation registers and starts the activation delay
/// - a running delay counts down and activates when it elapses
/// - otherwise players inside the trigger radius are claimed as dungeoneers
pub fn boss_room_system(ctx: &mut DungeonCtx<'_>, claims: &mut PendingDungeoneerClaims, dt: f32) {
    let networks: Vec<Entity> = ctx
        .world
        .query::<(&DungeonNetwork, &Position)>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();

    for network in networks {
        let Ok((pending, delay, active, radius, dungeon_id)) = ctx.world.get::<&DungeonNetwork>(network).map(|n| {
            (
                n.pending_activation,
                n.activation_delay,
                n.active,
                n.trigger_radius,
                n.dungeon_id.clone(),
            )
        }) else {
            continue;
        };

        if pending {
            // Started some other way in the meantime
            if active {
                if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
                    n.cancel_pending_activation();
                }
                continue;
            }
            register(ctx, network);
            if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
                n.pending_activation = false;
                n.activation_delay = Some(ctx.config.activation_delay);
            }
            log::info!(
                "Dungeon '{}' registered, activating in {:.1}s",
                dungeon_id,
                ctx.config.activation_delay
            );
            continue;
        }

        if let Some(remaining) = delay {
            let remaining = remaining - dt;
            if remaining > 0.0 {
                if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
                    n.activation_delay = Some(remaining);
                }
                continue;
            }
            let player = match ctx.world.get::<&mut DungeonNetwork>(network) {
                Ok(mut n) if n.active => {
                    n.cancel_pending_activation();
                    continue;
                }
                Ok(mut n) => {
                    n.activation_delay = None;
                    n.pending_player.take()
                }
                Err(_) => continue,
            };
            let player = player.filter(|&p| ctx.world.contains(p));
            activate(ctx, network, player);
            match player {
                Some(player) => grant_relic(ctx, network, player),
                None => {
                    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
                        n.triggered = true;
                    }
                }
            }
            log::info!("Activation complete for dungeon '{}'", dungeon_id);
            continue;
        }

        claim_nearby_players(ctx, claims, network, radius);

        if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
            let pruned = n.retain_dungeoneers(|p| ctx.world.contains(p));
            if pruned > 0 {
                log::debug!("Pruned {} stale dungeoneer refs from '{}'", pruned, dungeon_id);
            }
        }
    }
}

fn claim_nearby_players(
    ctx: &mut DungeonCtx<'_>,
    claims: &mut PendingDungeoneerClaims,
    network: Entity,
    radius: f32,
) {
    let Some(center) = position_of(ctx.world, network) else {
        return;
    };
    let nearby: Vec<Entity> = ctx
        .services
        .spatial
        .collect(ctx.world, center, radius)
        .into_iter()
        .filter(|&e| ctx.world.get::<&Player>(e).is_ok())
        .collect();

    for player in nearby {
        let tracked = ctx
            .world
            .get::<&DungeonNetwork>(network)
            .map(|n| n.has_dungeoneer(player))
            .unwrap_or(true);
        if tracked || ctx.world.get::<&Dungeoneer>(player).is_ok() {
            continue;
        }
        if !claims.try_claim(player) {
            continue;
        }
        if !add_dungeoneer(ctx, network, player, false) {
            continue;
        }

        // The first arrival in a quiet boss room starts the encounter
        if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
            let idle = !n.active
                && !n.triggered
                && !n.pending_activation
                && n.activation_delay.is_none();
            if idle {
                n.pending_activation = true;
                n.pending_player = Some(player);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DungeonEngine;
    use crate::systems::relic_picked_up;

    fn setup() -> (DungeonEngine, Entity) {
        let mut engine = DungeonEngine::new();
        let network = engine.world.spawn((
            Position::new(0.0, 0.0, 0.0),
            DungeonNetwork::new("crypt").with_trigger_radius(8.0),
        ));
        engine
            .world
            .spawn((Position::new(3.0, 0.0, 0.0), Spawner::new("hammer")));
        (engine, network)
    }

    fn net(engine: &DungeonEngine, network: Entity) -> DungeonNetwork {
        (*engine.world.get::<&DungeonNetwork>(network).unwrap()).clone()
    }

    #[test]
    fn test_registration_system_registers_once() {
        let (mut engine, network) = setup();
        registration_system(&mut engine.ctx());
        assert!(net(&engine, network).registered);
        assert_eq!(net(&engine, network).spawner_count(), 1);
        registration_system(&mut engine.ctx());
        assert_eq!(net(&engine, network).spawner_count(), 1);
    }

    #[test]
    fn test_player_claimed_and_activation_delayed() {
        let (mut engine, network) = setup();
        let player = engine
            .world
            .spawn((Position::new(2.0, 0.0, 0.0), Player::new("ada")));
        let mut claims = PendingDungeoneerClaims::new();

        boss_room_system(&mut engine.ctx(), &mut claims, 0.1);
        assert!(engine.world.get::<&Dungeoneer>(player).is_ok());
        assert!(net(&engine, network).pending_activation);

        boss_room_system(&mut engine.ctx(), &mut claims, 0.1);
        let n = net(&engine, network);
        assert!(n.registered);
        assert_eq!(n.activation_delay, Some(1.0));
        assert!(!n.active);

        boss_room_system(&mut engine.ctx(), &mut claims, 0.6);
        assert!(!net(&engine, network).active);
        boss_room_system(&mut engine.ctx(), &mut claims, 0.6);

        let n = net(&engine, network);
        assert!(n.active);
        assert!(n.triggered);
        assert_eq!(n.artifact_holder, Some(player));
        assert!(engine.world.get::<&Dungeoneer>(player).unwrap().relic_holder);
    }

    #[test]
    fn test_relic_pickup_cancels_delayed_activation() {
        let (mut engine, network) = setup();
        let ada = engine
            .world
            .spawn((Position::new(2.0, 0.0, 0.0), Player::new("ada")));
        let bo = engine
            .world
            .spawn((Position::new(-2.0, 0.0, 0.0), Player::new("bo")));
        let mut claims = PendingDungeoneerClaims::new();

        boss_room_system(&mut engine.ctx(), &mut claims, 0.1);
        boss_room_system(&mut engine.ctx(), &mut claims, 0.1);
        let n = net(&engine, network);
        assert!(n.activation_delay.is_some());
        let queued = n.pending_player.unwrap();
        let picker = if queued == ada { bo } else { ada };

        assert!(relic_picked_up(&mut engine.ctx(), picker));
        for _ in 0..30 {
            boss_room_system(&mut engine.ctx(), &mut claims, 0.1);
        }

        let n = net(&engine, network);
        assert!(n.active);
        assert_eq!(n.artifact_holder, Some(picker));
        assert!(n.activation_delay.is_none());
        assert!(n.pending_player.is_none());
        assert!(engine.world.get::<&Dungeoneer>(picker).unwrap().relic_holder);
        assert!(!engine.world.get::<&Dungeoneer>(queued).unwrap().relic_holder);
    }

    #[test]
    fn test_claim_rejected_for_second_network() {
        let (mut engine, first) = setup();
        let second = engine.world.spawn((
            Position::new(6.0, 0.0, 0.0),
            DungeonNetwork::new("tomb").with_trigger_radius(8.0),
        ));
        let player = engine
            .world
            .spawn((Position::new(3.0, 0.0, 0.0), Player::new("ada")));
        let mut claims = PendingDungeoneerClaims::new();

        boss_room_system(&mut engine.ctx(), &mut claims, 0.1);

        let members = net(&engine, first).dungeoneers().len() + net(&engine, second).dungeoneers().len();
        assert_eq!(members, 1);
        assert!(claims.is_claimed(player));
    }

    #[test]
    fn test_stale_dungeoneers_pruned() {
        let (mut engine, network) = setup();
        let ghost = engine.world.spawn(());
        engine
            .world
            .get::<&mut DungeonNetwork>(network)
            .unwrap()
            .add_dungeoneer(ghost);
        engine.world.despawn(ghost).unwrap();

        boss_room_system(&mut engine.ctx(), &mut PendingDungeoneerClaims::new(), 0.1);

        assert!(net(&engine, network).dungeoneers().is_empty());
    }
}
