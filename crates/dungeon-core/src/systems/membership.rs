//! Dungeoneer membership - who is inside which dungeon.

use std::collections::HashSet;

use hecs::{Entity, World};

use super::{deactivate, find_network_by_id, position_of, reset};
use crate::components::{DungeonNetwork, Dungeoneer, Health, Player, Position, Vec3};
use crate::engine::DungeonCtx;

/// Players claimed by some network during the current tick.
///
/// Several networks can see the same player in one tick; the first claim wins.
#[derive(Debug, Default)]
pub struct PendingDungeoneerClaims {
    claimed: HashSet<Entity>,
}

impl PendingDungeoneerClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `player` for this tick. False when someone already did.
    pub fn try_claim(&mut self, player: Entity) -> bool {
        self.claimed.insert(player)
    }

    pub fn is_claimed(&self, player: Entity) -> bool {
        self.claimed.contains(&player)
    }

    pub fn clear(&mut self) {
        self.claimed.clear();
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Display name for log lines
pub fn player_name(world: &World, player: Entity) -> String {
    world
        .get::<&Player>(player)
        .map(|p| p.name.clone())
        .unwrap_or_else(|_| "Unknown".to_string())
}

/// The network a dungeoneer belongs to.
///
/// Uses the stored reference while it is valid and falls back to the dungeon id.
pub fn network_of(world: &World, player: Entity) -> Option<Entity> {
    let dungeoneer = world.get::<&Dungeoneer>(player).ok()?;
    dungeoneer
        .network
        .filter(|&n| world.get::<&DungeonNetwork>(n).is_ok())
        .or_else(|| find_network_by_id(world, &dungeoneer.dungeon_id))
}

/// Make `player` a dungeoneer of `network`.
///
/// Membership is exclusive: a player that already carries a [`Dungeoneer`] is
/// rejected. The player's respawn points are backed up and replaced with the
/// dungeon spawn.
pub fn add_dungeoneer(
    ctx: &mut DungeonCtx<'_>,
    network: Entity,
    player: Entity,
    relic_holder: bool,
) -> bool {
    if !ctx.world.contains(player) {
        log::warn!("Cannot add dungeoneer: player {:?} is gone", player);
        return false;
    }
    if ctx.world.get::<&Dungeoneer>(player).is_ok() {
        log::warn!(
            "Player '{}' is already a dungeoneer, refusing second membership",
            player_name(ctx.world, player)
        );
        return false;
    }
    let Some(controller) = position_of(ctx.world, network) else {
        log::warn!("Cannot add dungeoneer: network {:?} has no position", network);
        return false;
    };
    let Ok((dungeon_id, spawn)) = ctx
        .world
        .get::<&DungeonNetwork>(network)
        .map(|n| (n.dungeon_id.clone(), n.spawn_or(controller)))
    else {
        log::warn!("Cannot add dungeoneer: {:?} has no network", network);
        return false;
    };

    let original = ctx.services.respawn.respawn_points(ctx.world, player);
    ctx.services
        .respawn
        .set_respawn_points(ctx.world, player, vec![spawn]);
    log::debug!(
        "Dungeon respawn set for '{}', backed up {} original points",
        player_name(ctx.world, player),
        original.len()
    );

    let mut dungeoneer = Dungeoneer::new(dungeon_id.clone(), network, spawn);
    dungeoneer.relic_holder = relic_holder;
    dungeoneer.original_respawn_points = original;
    if ctx.world.insert_one(player, dungeoneer).is_err() {
        return false;
    }
    if let Ok(mut net) = ctx.world.get::<&mut DungeonNetwork>(network) {
        net.add_dungeoneer(player);
    }
    log::info!(
        "Player '{}' entered dungeon '{}'",
        player_name(ctx.world, player),
        dungeon_id
    );
    true
}

/// Remove the player's membership and restore their respawn points.
///
/// Returns the removed record.
pub fn detach_dungeoneer(ctx: &mut DungeonCtx<'_>, player: Entity) -> Option<Dungeoneer> {
    let network = network_of(ctx.world, player);
    let record = ctx.world.remove_one::<Dungeoneer>(player).ok()?;
    ctx.services
        .respawn
        .set_respawn_points(ctx.world, player, record.original_respawn_points.clone());
    if let Some(network) = network {
        if let Ok(mut net) = ctx.world.get::<&mut DungeonNetwork>(network) {
            net.remove_dungeoneer(player);
        }
    }
    Some(record)
}

/// Detach every dungeoneer of `network` and clear its holder. Returns how many
/// live players were detached.
pub fn detach_all(ctx: &mut DungeonCtx<'_>, network: Entity) -> usize {
    let players = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(net) => net.dungeoneers().to_vec(),
        Err(_) => return 0,
    };
    let mut detached = 0;
    for player in players {
        if !ctx.world.contains(player) {
            continue;
        }
        if detach_dungeoneer(ctx, player).is_some() {
            detached += 1;
        }
    }
    if let Ok(mut net) = ctx.world.get::<&mut DungeonNetwork>(network) {
        net.clear_dungeoneers();
        net.artifact_holder = None;
    }
    detached
}

/// A player left the server. Their entity is despawned afterwards.
pub fn player_disconnected(ctx: &mut DungeonCtx<'_>, player: Entity) {
    let record = ctx
        .world
        .get::<&Dungeoneer>(player)
        .map(|d| (d.relic_holder, d.dungeon_id.clone()))
        .ok();
    if let Some((relic_holder, dungeon_id)) = record {
        log::info!(
            "Player '{}' left while in dungeon '{}' (relic holder: {})",
            player_name(ctx.world, player),
            dungeon_id,
            relic_holder
        );
        if let Some(network) = network_of(ctx.world, player) {
            if let Ok(mut net) = ctx.world.get::<&mut DungeonNetwork>(network) {
                net.remove_dungeoneer(player);
            }
            if relic_holder {
                log::info!("Relic holder disconnected, resetting dungeon '{}'", dungeon_id);
                reset(ctx, network);
                detach_all(ctx, network);
            } else if network_is_empty_and_active(ctx.world, network) {
                log::info!("All dungeoneers left dungeon '{}', deactivating", dungeon_id);
                deactivate(ctx, network);
            }
        }
    }
    if ctx.world.despawn(player).is_err() {
        log::debug!("Disconnected player {:?} was already gone", player);
    }
}

pub(crate) fn network_is_empty_and_active(world: &World, network: Entity) -> bool {
    world
        .get::<&DungeonNetwork>(network)
        .map(|n| n.active && n.dungeoneers().is_empty())
        .unwrap_or(false)
}

/// Put a player back at `spawn` with full health
pub(crate) fn respawn_player(world: &mut World, player: Entity, spawn: Vec3) {
    if let Ok(mut health) = world.get::<&mut Health>(player) {
        health.restore();
    }
    if let Ok(mut position) = world.get::<&mut Position>(player) {
        position.0 = spawn;
    }
    log::info!(
        "Respawned '{}' at ({:.1}, {:.1}, {:.1})",
        player_name(world, player),
        spawn.x,
        spawn.y,
        spawn.z
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::RespawnPoints;
    use crate::engine::DungeonEngine;

    fn setup() -> (DungeonEngine, Entity, Entity) {
        let mut engine = DungeonEngine::new();
        let network = engine.world.spawn((
            Position::new(10.0, 0.0, 10.0),
            DungeonNetwork::new("crypt").with_spawn_position(Vec3::new(12.0, 1.0, 10.0)),
        ));
        let player = engine.world.spawn((
            Position::new(11.0, 0.0, 10.0),
            Player::new("ada"),
            RespawnPoints(vec![Vec3::new(100.0, 64.0, 100.0)]),
        ));
        (engine, network, player)
    }

    #[test]
    fn test_claims_first_wins() {
        let mut world = World::new();
        let player = world.spawn(());
        let mut claims = PendingDungeoneerClaims::new();
        assert!(claims.try_claim(player));
        assert!(!claims.try_claim(player));
        assert!(claims.is_claimed(player));
        claims.clear();
        assert!(claims.is_empty());
        assert!(claims.try_claim(player));
    }

    #[test]
    fn test_add_replaces_respawn_points() {
        let (mut engine, network, player) = setup();
        let mut ctx = engine.ctx();

        assert!(add_dungeoneer(&mut ctx, network, player, false));

        let dungeoneer = ctx.world.get::<&Dungeoneer>(player).unwrap();
        assert_eq!(dungeoneer.dungeon_id, "crypt");
        assert_eq!(dungeoneer.spawn_position, Vec3::new(12.0, 1.0, 10.0));
        assert_eq!(
            dungeoneer.original_respawn_points,
            vec![Vec3::new(100.0, 64.0, 100.0)]
        );
        drop(dungeoneer);
        assert_eq!(
            ctx.world.get::<&RespawnPoints>(player).unwrap().0,
            vec![Vec3::new(12.0, 1.0, 10.0)]
        );
        assert!(ctx
            .world
            .get::<&DungeonNetwork>(network)
            .unwrap()
            .has_dungeoneer(player));
    }

    #[test]
    fn test_membership_is_exclusive() {
        let (mut engine, first, player) = setup();
        let second = engine
            .world
            .spawn((Position::new(30.0, 0.0, 10.0), DungeonNetwork::new("tomb")));
        let mut ctx = engine.ctx();

        assert!(add_dungeoneer(&mut ctx, first, player, false));
        assert!(!add_dungeoneer(&mut ctx, second, player, false));

        assert_eq!(network_of(ctx.world, player), Some(first));
        assert!(ctx
            .world
            .get::<&DungeonNetwork>(second)
            .unwrap()
            .dungeoneers()
            .is_empty());
    }

    #[test]
    fn test_detach_restores_respawn_points() {
        let (mut engine, network, player) = setup();
        let mut ctx = engine.ctx();
        add_dungeoneer(&mut ctx, network, player, false);

        let record = detach_dungeoneer(&mut ctx, player).unwrap();

        assert_eq!(record.dungeon_id, "crypt");
        assert!(ctx.world.get::<&Dungeoneer>(player).is_err());
        assert_eq!(
            ctx.world.get::<&RespawnPoints>(player).unwrap().0,
            vec![Vec3::new(100.0, 64.0, 100.0)]
        );
        assert!(ctx
            .world
            .get::<&DungeonNetwork>(network)
            .unwrap()
            .dungeoneers()
            .is_empty());
    }

    #[test]
    fn test_network_of_falls_back_to_id() {
        let (mut engine, network, player) = setup();
        engine
            .world
            .insert_one(
                player,
                Dungeoneer {
                    dungeon_id: "crypt".into(),
                    network: None,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(network_of(&engine.world, player), Some(network));
    }

    #[test]
    fn test_disconnect_despawns_player() {
        let (mut engine, network, player) = setup();
        let mut ctx = engine.ctx();
        add_dungeoneer(&mut ctx, network, player, false);

        player_disconnected(&mut ctx, player);

        assert!(!ctx.world.contains(player));
        assert!(ctx
            .world
            .get::<&DungeonNetwork>(network)
            .unwrap()
            .dungeoneers()
            .is_empty());
    }
}
