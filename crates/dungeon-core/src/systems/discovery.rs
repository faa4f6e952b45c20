//! Spatial network discovery - flood fill over proximity queries, plus
//! network lookups by position and id.

use std::collections::{HashSet, VecDeque};

use hecs::{Component, Entity, World};

use crate::components::{DungeonNetwork, Position, Vec3};
use crate::services::SpatialIndex;

/// World position of an entity, if it has one
pub fn position_of(world: &World, entity: Entity) -> Option<Vec3> {
    world.get::<&Position>(entity).ok().map(|p| p.0)
}

/// Breadth-first discovery of every entity matching `is_marker` reachable from
/// `seed` through hops of at most `radius`.
///
/// Each match is expanded from its own position, so a chain of markers is
/// found even when its total span exceeds `radius`. Result order follows the
/// spatial index and is not stable.
pub fn discover<F>(
    world: &World,
    index: &dyn SpatialIndex,
    seed: Vec3,
    radius: f32,
    is_marker: F,
) -> Vec<Entity>
where
    F: Fn(&World, Entity) -> bool,
{
    let mut queue = VecDeque::from([seed]);
    let mut visited: HashSet<Entity> = HashSet::new();
    let mut found = Vec::new();

    while let Some(center) = queue.pop_front() {
        for candidate in index.collect(world, center, radius) {
            if visited.contains(&candidate) || !world.contains(candidate) {
                continue;
            }
            if !is_marker(world, candidate) {
                continue;
            }
            let Some(position) = position_of(world, candidate) else {
                continue;
            };
            visited.insert(candidate);
            found.push(candidate);
            queue.push_back(position);
        }
    }

    found
}

/// Flood fill from an entity over everything carrying component `T`.
///
/// A seed without a position yields nothing.
pub fn flood_fill<T: Component>(
    world: &World,
    index: &dyn SpatialIndex,
    seed: Entity,
    radius: f32,
) -> Vec<Entity> {
    let Some(origin) = position_of(world, seed) else {
        log::debug!("Flood fill seed {:?} has no position", seed);
        return Vec::new();
    };
    discover(world, index, origin, radius, |w, e| w.get::<&T>(e).is_ok())
}

/// Closest network controller to `position` within `radius`
pub fn find_nearest_network(
    world: &World,
    index: &dyn SpatialIndex,
    position: Vec3,
    radius: f32,
) -> Option<Entity> {
    index
        .collect(world, position, radius)
        .into_iter()
        .filter(|&e| world.get::<&DungeonNetwork>(e).is_ok())
        .filter_map(|e| position_of(world, e).map(|p| (e, p.distance_squared(&position))))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(e, _)| e)
}

/// Network controller with the given id. Empty ids never match.
pub fn find_network_by_id(world: &World, dungeon_id: &str) -> Option<Entity> {
    if dungeon_id.is_empty() {
        return None;
    }
    world
        .query::<&DungeonNetwork>()
        .iter()
        .find(|(_, network)| network.dungeon_id == dungeon_id)
        .map(|(e, _)| e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Spawner;
    use crate::services::PositionScan;

    fn spawner_at(world: &mut World, x: f32, z: f32) -> Entity {
        world.spawn((Position::new(x, 0.0, z), Spawner::new("hammer")))
    }

    fn as_set(entities: Vec<Entity>) -> HashSet<Entity> {
        entities.into_iter().collect()
    }

    #[test]
    fn test_chain_longer_than_radius() {
        let mut world = World::new();
        let seed = world.spawn((Position::new(0.0, 0.0, 0.0),));
        let chain: Vec<Entity> = (1..=6)
            .map(|i| spawner_at(&mut world, i as f32 * 9.0, 0.0))
            .collect();

        let found = flood_fill::<Spawner>(&world, &PositionScan, seed, 10.0);
        assert_eq!(as_set(found), as_set(chain));
    }

    #[test]
    fn test_isolated_marker_excluded() {
        let mut world = World::new();
        let seed = world.spawn((Position::new(0.0, 0.0, 0.0),));
        let near = spawner_at(&mut world, 5.0, 0.0);
        let _far = spawner_at(&mut world, 50.0, 0.0);

        let found = flood_fill::<Spawner>(&world, &PositionScan, seed, 10.0);
        assert_eq!(found, vec![near]);
    }

    #[test]
    fn test_star_and_cycle() {
        let mut world = World::new();
        let seed = world.spawn((Position::new(0.0, 0.0, 0.0),));
        let mut expected = HashSet::new();
        // Star arms
        for (x, z) in [(8.0, 0.0), (-8.0, 0.0), (0.0, 8.0), (0.0, -8.0)] {
            expected.insert(spawner_at(&mut world, x, z));
        }
        // Ring around the east arm, closing back on itself
        for (x, z) in [(16.0, 0.0), (16.0, 8.0), (8.0, 8.0)] {
            expected.insert(spawner_at(&mut world, x, z));
        }

        let found = flood_fill::<Spawner>(&world, &PositionScan, seed, 9.0);
        assert_eq!(found.len(), expected.len());
        assert_eq!(as_set(found), expected);
    }

    #[test]
    fn test_seed_without_position() {
        let mut world = World::new();
        let seed = world.spawn(());
        spawner_at(&mut world, 1.0, 0.0);
        assert!(flood_fill::<Spawner>(&world, &PositionScan, seed, 10.0).is_empty());
    }

    #[test]
    fn test_marker_seed_finds_itself() {
        let mut world = World::new();
        let lonely = spawner_at(&mut world, 100.0, 100.0);
        let found = flood_fill::<Spawner>(&world, &PositionScan, lonely, 10.0);
        assert_eq!(found, vec![lonely]);
    }

    #[test]
    fn test_despawned_markers_skipped() {
        let mut world = World::new();
        let seed = world.spawn((Position::new(0.0, 0.0, 0.0),));
        let gone = spawner_at(&mut world, 2.0, 0.0);
        let kept = spawner_at(&mut world, 3.0, 0.0);
        world.despawn(gone).unwrap();

        let found = flood_fill::<Spawner>(&world, &PositionScan, seed, 10.0);
        assert_eq!(found, vec![kept]);
    }

    #[test]
    fn test_find_nearest_network() {
        let mut world = World::new();
        let far = world.spawn((Position::new(40.0, 0.0, 0.0), DungeonNetwork::new("far")));
        let near = world.spawn((Position::new(10.0, 0.0, 0.0), DungeonNetwork::new("near")));
        let _decoy = spawner_at(&mut world, 1.0, 0.0);

        assert_eq!(
            find_nearest_network(&world, &PositionScan, Vec3::ZERO, 500.0),
            Some(near)
        );
        assert_eq!(
            find_nearest_network(&world, &PositionScan, Vec3::new(45.0, 0.0, 0.0), 500.0),
            Some(far)
        );
        assert_eq!(find_nearest_network(&world, &PositionScan, Vec3::ZERO, 5.0), None);
    }

    #[test]
    fn test_find_network_by_id() {
        let mut world = World::new();
        let crypt = world.spawn((DungeonNetwork::new("crypt"),));
        world.spawn((DungeonNetwork::new(""),));
        assert_eq!(find_network_by_id(&world, "crypt"), Some(crypt));
        assert_eq!(find_network_by_id(&world, ""), None);
    }
}
