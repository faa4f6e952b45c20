//! Network merging - reconciles networks discovered independently around the
//! same dungeon.

use hecs::{Entity, World};

use super::position_of;
use crate::components::{DungeonNetwork, Vec3};
use crate::engine::DungeonCtx;

/// Two owned controllers found inside each other's merge radius
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConflict {
    pub first_id: String,
    pub first_position: Vec3,
    pub second_id: String,
    pub second_position: Vec3,
}

/// Outcome of [`check_and_merge`]
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// The surviving, canonical network controller
    pub network: Entity,
    /// Whether any neighbouring network was absorbed or discarded
    pub merged: bool,
    /// Whether an unresolved conflict was found
    pub conflict: bool,
    pub conflicts: Vec<NetworkConflict>,
}

impl MergeResult {
    fn untouched(network: Entity) -> Self {
        Self {
            network,
            merged: false,
            conflict: false,
            conflicts: Vec::new(),
        }
    }
}

/// Snapshot of a neighbour's identity, taken before any component moves
struct Candidate {
    entity: Entity,
    id: String,
    registered: bool,
    position: Vec3,
}

fn snapshot(world: &World, entity: Entity) -> Option<Candidate> {
    let network = world.get::<&DungeonNetwork>(entity).ok()?;
    Some(Candidate {
        entity,
        id: network.dungeon_id.clone(),
        registered: network.registered,
        position: position_of(world, entity).unwrap_or(Vec3::ZERO),
    })
}

/// Look for other networks within the merge radius of `network` and fold them
/// together.
///
/// Neighbours are handled in spatial-index order:
/// - a neighbour within the duplicate threshold is the same placement pasted
///   twice; the registered copy survives
/// - two networks that both carry an id are a conflict and are left alone
/// - otherwise the one carrying an id (or `network` when neither does) becomes
///   canonical and absorbs the other's spawners
pub fn check_and_merge(ctx: &mut DungeonCtx<'_>, network: Entity) -> MergeResult {
    let Some(this) = snapshot(ctx.world, network) else {
        log::debug!("Merge skipped: {:?} has no network", network);
        return MergeResult::untouched(network);
    };

    let neighbours: Vec<Entity> = ctx
        .services
        .spatial
        .collect(ctx.world, this.position, ctx.config.merge_radius)
        .into_iter()
        .filter(|&e| e != network && ctx.world.get::<&DungeonNetwork>(e).is_ok())
        .collect();
    if neighbours.is_empty() {
        return MergeResult::untouched(network);
    }

    let mut result = MergeResult::untouched(network);
    let mut canonical_id = this.id.clone();
    let mut canonical_position = this.position;

    for other_entity in neighbours {
        let Some(other) = snapshot(ctx.world, other_entity) else {
            continue;
        };

        let distance_sq = this.position.distance_squared(&other.position);
        if distance_sq < ctx.config.duplicate_distance_sq {
            if other.registered {
                log::info!(
                    "Duplicate network at ({:.1}, {:.1}, {:.1}), keeping the registered copy",
                    other.position.x,
                    other.position.y,
                    other.position.z
                );
                let _ = ctx.world.remove_one::<DungeonNetwork>(network);
                result.network = other.entity;
                result.merged = true;
                return result;
            }
            log::info!(
                "Duplicate network at ({:.1}, {:.1}, {:.1}), removing the copy",
                other.position.x,
                other.position.y,
                other.position.z
            );
            let _ = ctx.world.remove_one::<DungeonNetwork>(other.entity);
            result.merged = true;
            continue;
        }

        if !canonical_id.is_empty() && !other.id.is_empty() {
            log::error!(
                "Two dungeon controllers within {:.0} units: '{}' at ({:.1}, {:.1}, {:.1}) and '{}' at ({:.1}, {:.1}, {:.1}). \
                 They will not be merged, fix the placement",
                ctx.config.merge_radius,
                canonical_id,
                canonical_position.x,
                canonical_position.y,
                canonical_position.z,
                other.id,
                other.position.x,
                other.position.y,
                other.position.z
            );
            result.conflict = true;
            result.conflicts.push(NetworkConflict {
                first_id: canonical_id.clone(),
                first_position: canonical_position,
                second_id: other.id,
                second_position: other.position,
            });
            continue;
        }

        let secondary = if !other.id.is_empty() && canonical_id.is_empty() {
            let secondary = result.network;
            result.network = other.entity;
            canonical_id = other.id.clone();
            canonical_position = other.position;
            secondary
        } else {
            other.entity
        };

        let moved = merge_into(ctx.world, result.network, secondary);
        log::info!(
            "Merged network at ({:.1}, {:.1}, {:.1}) into '{}': {} spawners moved",
            other.position.x,
            other.position.y,
            other.position.z,
            if canonical_id.is_empty() { "(unnamed)" } else { canonical_id.as_str() },
            moved
        );
        result.merged = true;
    }

    result
}

/// Move `secondary`'s spawners and entrance into `primary` and strip its
/// network role. Returns how many spawners moved.
fn merge_into(world: &mut World, primary: Entity, secondary: Entity) -> usize {
    let Ok(husk) = world.remove_one::<DungeonNetwork>(secondary) else {
        return 0;
    };
    let live_spawners: Vec<Entity> = husk
        .spawners()
        .iter()
        .copied()
        .filter(|&s| world.contains(s))
        .collect();
    let live_entrance = husk.entrance.filter(|&e| world.contains(e));

    let Ok(mut canonical) = world.get::<&mut DungeonNetwork>(primary) else {
        log::warn!("Merge target {:?} lost its network", primary);
        return 0;
    };
    let mut moved = 0;
    for spawner in live_spawners {
        if canonical.add_spawner(spawner) {
            moved += 1;
        }
    }
    if canonical.entrance.is_none() {
        canonical.entrance = live_entrance;
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Position, Spawner};
    use crate::engine::DungeonEngine;

    fn network_at(engine: &mut DungeonEngine, id: &str, x: f32) -> Entity {
        engine
            .world
            .spawn((Position::new(x, 0.0, 0.0), DungeonNetwork::new(id)))
    }

    fn link_spawner(engine: &mut DungeonEngine, network: Entity, x: f32) -> Entity {
        let spawner = engine
            .world
            .spawn((Position::new(x, 0.0, 5.0), Spawner::new("hammer")));
        engine
            .world
            .get::<&mut DungeonNetwork>(network)
            .unwrap()
            .add_spawner(spawner);
        spawner
    }

    #[test]
    fn test_lonely_network_untouched() {
        let mut engine = DungeonEngine::new();
        let network = network_at(&mut engine, "crypt", 0.0);
        let result = check_and_merge(&mut engine.ctx(), network);
        assert_eq!(result, MergeResult::untouched(network));
    }

    #[test]
    fn test_unnamed_neighbour_absorbed() {
        let mut engine = DungeonEngine::new();
        let named = network_at(&mut engine, "crypt", 0.0);
        let unnamed = network_at(&mut engine, "", 20.0);
        link_spawner(&mut engine, named, 1.0);
        link_spawner(&mut engine, unnamed, 21.0);
        link_spawner(&mut engine, unnamed, 22.0);

        let result = check_and_merge(&mut engine.ctx(), named);

        assert_eq!(result.network, named);
        assert!(result.merged);
        assert!(!result.conflict);
        assert!(engine.world.get::<&DungeonNetwork>(unnamed).is_err());
        assert!(engine.world.contains(unnamed));
        assert_eq!(
            engine.world.get::<&DungeonNetwork>(named).unwrap().spawner_count(),
            3
        );
    }

    #[test]
    fn test_named_neighbour_becomes_canonical() {
        let mut engine = DungeonEngine::new();
        let unnamed = network_at(&mut engine, "", 0.0);
        let named = network_at(&mut engine, "crypt", 15.0);
        let entrance = engine.world.spawn((Position::new(0.0, 0.0, 30.0),));
        let spawner = link_spawner(&mut engine, unnamed, 2.0);
        engine
            .world
            .get::<&mut DungeonNetwork>(unnamed)
            .unwrap()
            .entrance = Some(entrance);

        let result = check_and_merge(&mut engine.ctx(), unnamed);

        assert_eq!(result.network, named);
        assert!(result.merged);
        let canonical = engine.world.get::<&DungeonNetwork>(named).unwrap();
        assert_eq!(canonical.spawners(), &[spawner]);
        assert_eq!(canonical.entrance, Some(entrance));
        assert!(engine.world.get::<&DungeonNetwork>(unnamed).is_err());
    }

    #[test]
    fn test_conflict_leaves_both_alone() {
        let mut engine = DungeonEngine::new();
        let first = network_at(&mut engine, "crypt", 0.0);
        let second = network_at(&mut engine, "tomb", 10.0);
        link_spawner(&mut engine, first, 1.0);
        link_spawner(&mut engine, second, 11.0);

        let result = check_and_merge(&mut engine.ctx(), first);

        assert!(result.conflict);
        assert!(!result.merged);
        assert_eq!(result.network, first);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].second_id, "tomb");
        assert_eq!(result.conflicts[0].second_position, Vec3::new(10.0, 0.0, 0.0));
        for network in [first, second] {
            assert_eq!(
                engine.world.get::<&DungeonNetwork>(network).unwrap().spawner_count(),
                1
            );
        }
    }

    #[test]
    fn test_duplicate_defers_to_registered_copy() {
        let mut engine = DungeonEngine::new();
        let original = network_at(&mut engine, "crypt", 0.0);
        engine
            .world
            .get::<&mut DungeonNetwork>(original)
            .unwrap()
            .registered = true;
        let pasted = network_at(&mut engine, "crypt", 0.5);

        let result = check_and_merge(&mut engine.ctx(), pasted);

        assert_eq!(result.network, original);
        assert!(result.merged);
        assert!(engine.world.get::<&DungeonNetwork>(pasted).is_err());
        assert!(engine.world.get::<&DungeonNetwork>(original).is_ok());
    }

    #[test]
    fn test_duplicate_threshold_is_configurable() {
        let mut engine = DungeonEngine::new();
        engine.config.duplicate_distance_sq = 0.01;
        let first = network_at(&mut engine, "crypt", 0.0);
        let second = network_at(&mut engine, "crypt", 0.5);

        let result = check_and_merge(&mut engine.ctx(), first);

        // Half a unit apart is no longer a duplicate, so two named controllers conflict
        assert!(result.conflict);
        assert!(engine.world.get::<&DungeonNetwork>(second).is_ok());
    }
}
