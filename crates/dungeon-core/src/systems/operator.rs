//! Operator operations - what command handlers call to build and inspect
//! dungeons.

use hecs::{Entity, World};
use rand::Rng;
use thiserror::Error;

use super::lifecycle::cleanup_spawner;
use super::{deactivate, detach_all, find_nearest_network, position_of};
use crate::components::*;
use crate::engine::DungeonCtx;

/// Why an entity could not take a dungeon role
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssignError {
    #[error("entity {0:?} does not exist")]
    NoEntity(Entity),
    #[error("entity is already dungeon network '{0}'")]
    AlreadyNetwork(String),
    #[error("entity is already the entrance of '{0}'")]
    IsEntrance(String),
    #[error("entity is a spawner")]
    IsSpawner,
    #[error("no dungeon id given and no network nearby")]
    NoDungeonId,
}

/// Snapshot of a network for status commands
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInfo {
    pub dungeon_id: String,
    pub position: Option<Vec3>,
    pub trigger_radius: f32,
    pub spawn_position: Vec3,
    pub active: bool,
    pub registered: bool,
    pub triggered: bool,
    pub spawner_count: usize,
    pub live_spawner_count: usize,
    pub dungeoneer_count: usize,
    pub has_entrance: bool,
    pub block_count: usize,
    pub artifact_holder: Option<Entity>,
}

fn check_assignable(world: &World, entity: Entity) -> Result<(), AssignError> {
    if !world.contains(entity) {
        return Err(AssignError::NoEntity(entity));
    }
    if let Ok(n) = world.get::<&DungeonNetwork>(entity) {
        return Err(AssignError::AlreadyNetwork(n.dungeon_id.clone()));
    }
    if let Ok(e) = world.get::<&DungeonEntrance>(entity) {
        return Err(AssignError::IsEntrance(e.dungeon_id.clone()));
    }
    if world.get::<&Spawner>(entity).is_ok() {
        return Err(AssignError::IsSpawner);
    }
    Ok(())
}

/// Turn `entity` into a network controller. Returns the dungeon id.
///
/// Without an id one is generated as `dungeon_` followed by 8 hex digits.
pub fn assign_network(
    ctx: &mut DungeonCtx<'_>,
    entity: Entity,
    dungeon_id: Option<&str>,
) -> Result<String, AssignError> {
    check_assignable(ctx.world, entity)?;
    let id = match dungeon_id.filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => format!("dungeon_{:08x}", ctx.rng.gen::<u32>()),
    };
    let network = DungeonNetwork::new(id.clone()).with_trigger_radius(ctx.config.default_trigger_radius);
    ctx.world
        .insert_one(entity, network)
        .map_err(|_| AssignError::NoEntity(entity))?;
    log::info!("Assigned dungeon network '{}' to {:?}", id, entity);
    Ok(id)
}

/// Turn `entity` into an entrance. Returns the dungeon id it leads to.
///
/// Without an id the nearest network within `nearest_search_radius` is used.
/// A network with the same id gets the entrance linked right away.
pub fn assign_entrance(
    ctx: &mut DungeonCtx<'_>,
    entity: Entity,
    dungeon_id: Option<&str>,
) -> Result<String, AssignError> {
    check_assignable(ctx.world, entity)?;

    let (id, network) = match dungeon_id.filter(|id| !id.is_empty()) {
        Some(id) => (id.to_string(), super::find_network_by_id(ctx.world, id)),
        None => {
            let at = position_of(ctx.world, entity).ok_or(AssignError::NoDungeonId)?;
            let nearest = find_nearest_network(
                ctx.world,
                ctx.services.spatial.as_ref(),
                at,
                ctx.config.nearest_search_radius,
            )
            .ok_or(AssignError::NoDungeonId)?;
            let id = ctx
                .world
                .get::<&DungeonNetwork>(nearest)
                .map(|n| n.dungeon_id.clone())
                .map_err(|_| AssignError::NoDungeonId)?;
            if id.is_empty() {
                return Err(AssignError::NoDungeonId);
            }
            (id, Some(nearest))
        }
    };

    ctx.world
        .insert_one(entity, DungeonEntrance::new(id.clone()))
        .map_err(|_| AssignError::NoEntity(entity))?;
    if let Some(network) = network {
        if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
            n.entrance = Some(entity);
        }
    }
    log::info!("Assigned entrance of '{}' to {:?}", id, entity);
    Ok(id)
}

/// Wipe a network's runtime graph so it can be registered from scratch.
///
/// The controller keeps its id, radius and blocks.
pub fn discard_network(ctx: &mut DungeonCtx<'_>, network: Entity) -> bool {
    let spawners = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) => n.spawners().to_vec(),
        Err(_) => return false,
    };
    deactivate(ctx, network);
    for spawner in spawners {
        if ctx.world.contains(spawner) {
            cleanup_spawner(ctx, spawner);
        }
    }
    detach_all(ctx, network);

    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
        n.clear_spawners();
        n.entrance = None;
        n.reset_runtime();
        n.registered = false;
        log::info!("Discarded dungeon '{}'", n.dungeon_id);
    }
    true
}

/// The controller entity is going away: clean up everything it owns, then
/// despawn it.
pub fn remove_network(ctx: &mut DungeonCtx<'_>, network: Entity) -> bool {
    let (spawners, dungeon_id) = match ctx.world.get::<&DungeonNetwork>(network) {
        Ok(n) => (n.spawners().to_vec(), n.dungeon_id.clone()),
        Err(_) => return false,
    };
    for spawner in spawners {
        if ctx.world.contains(spawner) {
            cleanup_spawner(ctx, spawner);
        }
    }
    detach_all(ctx, network);
    let _ = ctx.world.despawn(network);
    log::info!("Removed dungeon '{}'", dungeon_id);
    true
}

/// Despawn everything a trap or monster left behind. Returns the count.
pub fn clean_spawned_entities(world: &mut World) -> usize {
    let spawned: Vec<Entity> = world
        .query::<&SpawnedEntity>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();
    let count = spawned.len();
    for entity in spawned {
        let _ = world.despawn(entity);
    }
    log::info!("Cleaned {} spawned entities", count);
    count
}

/// Flip one spawner between armed and disarmed. Returns the new state, or
/// `None` when the entity is not a spawner.
pub fn toggle_spawner(ctx: &mut DungeonCtx<'_>, spawner: Entity) -> Option<bool> {
    let active = ctx.world.get::<&Spawner>(spawner).ok()?.active;
    if active {
        super::deactivate_spawner(ctx, spawner);
        Some(false)
    } else {
        Some(super::activate_spawner(ctx, spawner))
    }
}

pub fn network_info(world: &World, network: Entity) -> Option<NetworkInfo> {
    let n = world.get::<&DungeonNetwork>(network).ok()?;
    let position = position_of(world, network);
    Some(NetworkInfo {
        dungeon_id: n.dungeon_id.clone(),
        position,
        trigger_radius: n.trigger_radius,
        spawn_position: n.spawn_or(position.unwrap_or(Vec3::ZERO)),
        active: n.active,
        registered: n.registered,
        triggered: n.triggered,
        spawner_count: n.spawner_count(),
        live_spawner_count: n.spawners().iter().filter(|&&s| world.contains(s)).count(),
        dungeoneer_count: n.dungeoneers().len(),
        has_entrance: n.entrance.map_or(false, |e| world.contains(e)),
        block_count: n.blocks.len(),
        artifact_holder: n.artifact_holder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DungeonEngine;
    use crate::systems::{activate, add_dungeoneer, register};

    fn setup() -> (DungeonEngine, Entity) {
        let mut engine = DungeonEngine::with_seed(7);
        let network = engine
            .world
            .spawn((Position::new(0.0, 0.0, 0.0), DungeonNetwork::new("crypt")));
        engine
            .world
            .spawn((Position::new(4.0, 0.0, 0.0), Spawner::new("hammer")));
        engine
            .world
            .spawn((Position::new(8.0, 0.0, 0.0), Spawner::new("archer")));
        (engine, network)
    }

    #[test]
    fn test_assign_network_generates_id() {
        let mut engine = DungeonEngine::with_seed(7);
        let entity = engine.world.spawn((Position::new(1.0, 0.0, 1.0),));

        let id = assign_network(&mut engine.ctx(), entity, None).unwrap();

        assert!(id.starts_with("dungeon_"));
        assert_eq!(id.len(), "dungeon_".len() + 8);
        let n = engine.world.get::<&DungeonNetwork>(entity).unwrap();
        assert_eq!(n.dungeon_id, id);
        assert_eq!(n.trigger_radius, engine.config.default_trigger_radius);
    }

    #[test]
    fn test_assign_rejects_existing_roles() {
        let (mut engine, network) = setup();
        let spawner = engine
            .world
            .spawn((Position::default(), Spawner::new("laser")));
        let mut ctx = engine.ctx();

        assert_eq!(
            assign_network(&mut ctx, network, Some("tomb")),
            Err(AssignError::AlreadyNetwork("crypt".into()))
        );
        assert_eq!(
            assign_network(&mut ctx, spawner, Some("tomb")),
            Err(AssignError::IsSpawner)
        );
        assert_eq!(
            assign_entrance(&mut ctx, network, Some("crypt")),
            Err(AssignError::AlreadyNetwork("crypt".into()))
        );
    }

    #[test]
    fn test_assign_entrance_uses_nearest_network() {
        let (mut engine, network) = setup();
        let door = engine.world.spawn((Position::new(0.0, 0.0, 40.0),));

        let id = assign_entrance(&mut engine.ctx(), door, None).unwrap();

        assert_eq!(id, "crypt");
        assert_eq!(
            engine.world.get::<&DungeonNetwork>(network).unwrap().entrance,
            Some(door)
        );
    }

    #[test]
    fn test_assign_entrance_without_network_fails() {
        let mut engine = DungeonEngine::new();
        let door = engine.world.spawn((Position::default(),));
        assert_eq!(
            assign_entrance(&mut engine.ctx(), door, None),
            Err(AssignError::NoDungeonId)
        );
    }

    #[test]
    fn test_discard_network_unregisters() {
        let (mut engine, network) = setup();
        let player = engine
            .world
            .spawn((Position::new(2.0, 0.0, 0.0), Player::new("ada")));
        {
            let mut ctx = engine.ctx();
            add_dungeoneer(&mut ctx, network, player, true);
            activate(&mut ctx, network, Some(player));
            assert!(discard_network(&mut ctx, network));
        }

        let info = network_info(&engine.world, network).unwrap();
        assert!(!info.active);
        assert!(!info.registered);
        assert_eq!(info.spawner_count, 0);
        assert_eq!(info.dungeoneer_count, 0);
        assert!(engine.world.get::<&Dungeoneer>(player).is_err());
        assert_eq!(clean_spawned_entities(&mut engine.world), 0);

        // Discarded networks can be registered again
        assert_eq!(register(&mut engine.ctx(), network), 2);
    }

    #[test]
    fn test_remove_network_despawns_controller() {
        let (mut engine, network) = setup();
        activate(&mut engine.ctx(), network, None);
        assert!(engine.world.query::<&SpawnedEntity>().iter().count() > 0);

        assert!(remove_network(&mut engine.ctx(), network));

        assert!(!engine.world.contains(network));
        assert_eq!(engine.world.query::<&SpawnedEntity>().iter().count(), 0);
        assert!(!remove_network(&mut engine.ctx(), network));
    }

    #[test]
    fn test_toggle_spawner() {
        let (mut engine, network) = setup();
        register(&mut engine.ctx(), network);
        let first = engine.world.get::<&DungeonNetwork>(network).unwrap().spawners()[0];

        assert_eq!(toggle_spawner(&mut engine.ctx(), first), Some(true));
        assert_eq!(toggle_spawner(&mut engine.ctx(), first), Some(false));
        assert_eq!(toggle_spawner(&mut engine.ctx(), network), None);
    }

    #[test]
    fn test_network_info_counts_live_spawners() {
        let (mut engine, network) = setup();
        register(&mut engine.ctx(), network);
        let first = engine.world.get::<&DungeonNetwork>(network).unwrap().spawners()[0];
        engine.world.despawn(first).unwrap();

        let info = network_info(&engine.world, network).unwrap();
        assert_eq!(info.dungeon_id, "crypt");
        assert_eq!(info.spawner_count, 2);
        assert_eq!(info.live_spawner_count, 1);
        assert_eq!(info.position, Some(Vec3::ZERO));
    }
}
