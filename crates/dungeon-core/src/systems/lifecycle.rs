//! Dungeon lifecycle - registration, activation, deactivation and the relic.
//!
//! Every operation tolerates missing state: it logs and returns a zero, `false`
//! or no-op result instead of failing.

use hecs::{Entity, World};

use super::{
    add_dungeoneer, check_and_merge, detach_all, flood_fill, network_of, player_name, position_of,
};
use crate::components::*;
use crate::engine::DungeonCtx;
use crate::spawnable::{Spawnable, SpawnableRegistry};

/// Execution id of a spawner and its behavior, if it resolves
fn behavior_of<'r>(
    world: &World,
    registry: &'r SpawnableRegistry,
    spawner: Entity,
) -> Option<(String, &'r dyn Spawnable)> {
    let id = match world.get::<&Spawner>(spawner) {
        Ok(s) => s.execution_id.clone(),
        Err(_) => {
            log::warn!("Entity {:?} has no spawner", spawner);
            return None;
        }
    };
    let behavior = registry.resolve(&id)?;
    Some((id, behavior))
}

fn set_spawner_active(world: &mut World, spawner: Entity, active: bool) {
    if let Ok(mut s) = world.get::<&mut Spawner>(spawner) {
        s.active = active;
    }
}

/// Discover and link the network's spawners and entrance.
///
/// Returns the number of linked spawners. Calling it again on a registered
/// network changes nothing and returns the same count. A network merged into
/// a neighbour returns 0.
pub fn register(ctx: &mut DungeonCtx<'_>, network: Entity) -> usize {
    let (registered, count, was_active, dungeon_id) = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) => (n.registered, n.spawner_count(), n.active, n.dungeon_id.clone()),
        Err(_) => {
            log::warn!("Cannot register {:?}: no dungeon network", network);
            return 0;
        }
    };
    if registered {
        log::debug!("Dungeon '{}' already registered", dungeon_id);
        return count;
    }
    if position_of(ctx.world, network).is_none() {
        log::warn!("Cannot register dungeon '{}': no position", dungeon_id);
        return 0;
    }

    // Active but never registered means the runtime state was lost
    if was_active {
        log::warn!(
            "Dungeon '{}' was active but unregistered, resetting its state",
            dungeon_id
        );
        if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
            n.active = false;
            n.artifact_holder = None;
            n.clear_dungeoneers();
        }
    }

    let merge = check_and_merge(ctx, network);
    if merge.conflict {
        log::error!(
            "Dungeon '{}' has {} conflicting controller(s) nearby",
            dungeon_id,
            merge.conflicts.len()
        );
    }
    if merge.network != network {
        log::info!("Dungeon {:?} was merged into {:?}, skipping registration", network, merge.network);
        return 0;
    }
    if ctx.world.get::<&DungeonNetwork>(network).is_err() {
        return 0;
    }

    let spawners = flood_fill::<Spawner>(
        ctx.world,
        ctx.services.spatial.as_ref(),
        network,
        ctx.config.registration_radius,
    );
    let registry = ctx.registry;
    for spawner in spawners {
        if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
            n.add_spawner(spawner);
        }
        if let Some((id, behavior)) = behavior_of(ctx.world, registry, spawner) {
            behavior.register(ctx, spawner);
            log::debug!("Registered spawner '{}' to dungeon '{}'", id, dungeon_id);
        }
    }

    scan_blocks(ctx, network);
    let entrance_found = link_entrance(ctx, network);

    let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) else {
        return 0;
    };
    n.registered = true;
    log::info!(
        "Dungeon '{}' registered: {} spawners, {} blocks, entrance found: {}",
        dungeon_id,
        n.spawner_count(),
        n.blocks.len(),
        entrance_found
    );
    n.spawner_count()
}

/// Replace the network's block list with the dungeon blocks around it
fn scan_blocks(ctx: &mut DungeonCtx<'_>, network: Entity) {
    let Some(center) = position_of(ctx.world, network) else {
        return;
    };
    let found = ctx
        .services
        .blocks
        .dungeon_blocks_near(center, ctx.config.block_scan_radius);
    for block in &found {
        log::trace!(
            "Dungeon block '{}' at ({}, {}, {})",
            block.base_block_id,
            block.x,
            block.y,
            block.z
        );
    }
    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
        n.blocks = found;
    }
}

/// Link the entrance carrying the network's id. Networks without an id have none.
fn link_entrance(ctx: &mut DungeonCtx<'_>, network: Entity) -> bool {
    let dungeon_id = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) if n.has_id() => n.dungeon_id.clone(),
        _ => return false,
    };

    let candidates = flood_fill::<DungeonEntrance>(
        ctx.world,
        ctx.services.spatial.as_ref(),
        network,
        ctx.config.entrance_search_radius,
    );
    let entrance = candidates.into_iter().find(|&e| {
        ctx.world
            .get::<&DungeonEntrance>(e)
            .map(|entrance| entrance.dungeon_id == dungeon_id)
            .unwrap_or(false)
    });

    match entrance {
        Some(entrance) => {
            if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
                n.entrance = Some(entrance);
            }
            log::info!("Linked entrance to dungeon '{}'", dungeon_id);
            true
        }
        None => {
            log::warn!(
                "No entrance found for dungeon '{}' within {:.0}",
                dungeon_id,
                ctx.config.entrance_search_radius
            );
            false
        }
    }
}

fn apply_block_state(ctx: &mut DungeonCtx<'_>, network: Entity, state: &str) -> usize {
    let blocks = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) => n.blocks.clone(),
        Err(_) => return 0,
    };
    for block in &blocks {
        ctx.services
            .blocks
            .set_state(block.pos(), &block.base_block_id, state);
    }
    blocks.len()
}

/// Arm every spawner of the network. Registers first when needed.
///
/// Returns how many spawners were activated. Despawned references and
/// unresolved execution ids are skipped.
pub fn activate(ctx: &mut DungeonCtx<'_>, network: Entity, holder: Option<Entity>) -> usize {
    let (active, registered) = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) => (n.active, n.registered),
        Err(_) => {
            log::warn!("Cannot activate {:?}: no dungeon network", network);
            return 0;
        }
    };
    if active {
        log::debug!("Dungeon {:?} already active", network);
        return 0;
    }
    if !registered {
        log::info!("Dungeon {:?} not registered, registering spawners first", network);
        register(ctx, network);
    }

    let spawners = match ctx.world.get::<&mut DungeonNetwork>(network) {
        Ok(mut n) if n.registered => {
            n.active = true;
            // Whoever activated first owns the relic; a queued boss-room start is void
            n.cancel_pending_activation();
            n.artifact_holder = holder.filter(|&h| ctx.world.contains(h));
            n.spawners().to_vec()
        }
        _ => {
            log::warn!("Dungeon {:?} could not be registered, not activating", network);
            return 0;
        }
    };

    let mut activated = 0;
    for &spawner in &spawners {
        if !ctx.world.contains(spawner) {
            continue;
        }
        if activate_spawner(ctx, spawner) {
            activated += 1;
        }
    }
    let blocks = apply_block_state(ctx, network, BLOCK_STATE_ACTIVE);

    log::info!(
        "Dungeon activated: {}/{} spawners triggered, {} blocks activated",
        activated,
        spawners.len(),
        blocks
    );
    activated
}

/// Ask every spawner to wind down and mark the network inactive.
///
/// Membership and the spawner graph are kept. Returns how many spawners were
/// deactivated.
pub fn deactivate(ctx: &mut DungeonCtx<'_>, network: Entity) -> usize {
    let spawners = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) if n.active => n.spawners().to_vec(),
        Ok(_) => {
            log::debug!("Dungeon {:?} already inactive", network);
            return 0;
        }
        Err(_) => {
            log::warn!("Cannot deactivate {:?}: no dungeon network", network);
            return 0;
        }
    };

    let mut deactivated = 0;
    for spawner in spawners {
        if !ctx.world.contains(spawner) {
            continue;
        }
        if deactivate_spawner(ctx, spawner) {
            deactivated += 1;
        }
    }
    let blocks = apply_block_state(ctx, network, BLOCK_STATE_INACTIVE);

    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
        n.active = false;
    }
    log::info!(
        "Dungeon deactivated: {} spawners stopped, {} blocks deactivated",
        deactivated,
        blocks
    );
    deactivated
}

/// Deactivate and clear every runtime flag. Registration is kept.
pub fn reset(ctx: &mut DungeonCtx<'_>, network: Entity) {
    deactivate(ctx, network);
    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
        n.reset_runtime();
        log::info!("Dungeon '{}' reset", n.dungeon_id);
    }
}

pub fn activate_spawner(ctx: &mut DungeonCtx<'_>, spawner: Entity) -> bool {
    let registry = ctx.registry;
    let Some((id, behavior)) = behavior_of(ctx.world, registry, spawner) else {
        return false;
    };
    behavior.activate(ctx, spawner);
    set_spawner_active(ctx.world, spawner, true);
    log::debug!("Activated spawner '{}'", id);
    true
}

pub fn deactivate_spawner(ctx: &mut DungeonCtx<'_>, spawner: Entity) -> bool {
    set_spawner_active(ctx.world, spawner, false);
    let registry = ctx.registry;
    let Some((id, behavior)) = behavior_of(ctx.world, registry, spawner) else {
        return false;
    };
    behavior.deactivate(ctx, spawner);
    log::debug!("Deactivated spawner '{}'", id);
    true
}

pub fn reset_spawner(ctx: &mut DungeonCtx<'_>, spawner: Entity) -> bool {
    let registry = ctx.registry;
    let Some((id, behavior)) = behavior_of(ctx.world, registry, spawner) else {
        return false;
    };
    behavior.reset(ctx, spawner);
    set_spawner_active(ctx.world, spawner, true);
    log::debug!("Reset spawner '{}'", id);
    true
}

/// Remove the spawner's manifestation and runtime state right away
pub fn cleanup_spawner(ctx: &mut DungeonCtx<'_>, spawner: Entity) {
    let registry = ctx.registry;
    if let Some((id, behavior)) = behavior_of(ctx.world, registry, spawner) {
        behavior.cleanup(ctx, spawner);
        set_spawner_active(ctx.world, spawner, false);
        log::debug!("Cleaned up spawner '{}'", id);
    }
}

/// Swap a spawner's behavior: clean up the old one, register the new one.
///
/// False when the spawner is missing or the new id does not resolve. An empty
/// id leaves the spawner unconfigured and succeeds.
pub fn set_spawner_action(ctx: &mut DungeonCtx<'_>, spawner: Entity, execution_id: &str) -> bool {
    if ctx.world.get::<&Spawner>(spawner).is_err() {
        log::warn!("Cannot set action: {:?} has no spawner", spawner);
        return false;
    }
    cleanup_spawner(ctx, spawner);
    if let Ok(mut s) = ctx.world.get::<&mut Spawner>(spawner) {
        s.active = false;
        s.execution_id = execution_id.to_string();
    }
    if execution_id.is_empty() {
        return true;
    }

    let registry = ctx.registry;
    match registry.resolve(execution_id) {
        Some(behavior) => {
            behavior.register(ctx, spawner);
            log::debug!("Registered new action '{}'", execution_id);
            true
        }
        None => false,
    }
}

/// The player picked up the relic: they become the holder and the dungeon starts
pub fn relic_picked_up(ctx: &mut DungeonCtx<'_>, player: Entity) -> bool {
    let Some(network) = network_of(ctx.world, player) else {
        log::warn!(
            "Cannot pick up relic: '{}' is not in a dungeon",
            player_name(ctx.world, player)
        );
        return false;
    };
    if let Ok(mut d) = ctx.world.get::<&mut Dungeoneer>(player) {
        d.relic_holder = true;
    }
    log::info!("Player '{}' picked up the relic", player_name(ctx.world, player));

    activate(ctx, network, Some(player));
    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
        if n.active {
            n.artifact_holder = Some(player);
        }
    }
    true
}

/// The holder lost the relic. The whole dungeon resets and every dungeoneer is
/// released; the relic is never handed to another participant.
pub fn relic_lost(ctx: &mut DungeonCtx<'_>, player: Entity) -> bool {
    let is_holder = ctx
        .world
        .get::<&Dungeoneer>(player)
        .map(|d| d.relic_holder)
        .unwrap_or(false);
    if !is_holder {
        return false;
    }
    let network = network_of(ctx.world, player);
    if let Ok(mut d) = ctx.world.get::<&mut Dungeoneer>(player) {
        d.relic_holder = false;
    }
    let Some(network) = network else {
        return false;
    };

    log::info!("Player '{}' lost the relic", player_name(ctx.world, player));
    reset(ctx, network);
    detach_all(ctx, network);
    true
}

/// A player used the network's pedestal.
///
/// Fails once the network has triggered or is already active. Otherwise the
/// network registers, activates with the player as holder and the player
/// becomes the relic-holding dungeoneer.
pub fn trigger_pedestal(ctx: &mut DungeonCtx<'_>, network: Entity, player: Entity) -> bool {
    if !ctx.world.contains(player) {
        return false;
    }
    match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) if !n.triggered && !n.active => {}
        Ok(_) => {
            log::debug!("Pedestal of {:?} already used", network);
            return false;
        }
        Err(_) => return false,
    }

    register(ctx, network);
    activate(ctx, network, Some(player));
    grant_relic(ctx, network, player);
    true
}

/// Make `player` the relic holder of an activating network
pub(crate) fn grant_relic(ctx: &mut DungeonCtx<'_>, network: Entity, player: Entity) {
    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
        n.artifact_holder = Some(player).filter(|_| ctx.world.contains(player));
        n.triggered = true;
    }
    if !ctx.world.contains(player) {
        return;
    }
    if ctx.world.get::<&Dungeoneer>(player).is_err() {
        add_dungeoneer(ctx, network, player, true);
    }
    if let Ok(mut d) = ctx.world.get::<&mut Dungeoneer>(player) {
        d.relic_holder = true;
    }
}
