//! Target selection and helpers shared by the trap behaviors.

use hecs::{Entity, World};

use crate::components::*;
use crate::engine::DungeonCtx;
use crate::services::{DamageEvent, SpatialIndex};

/// Living, damageable entities within `radius` of `center`
pub fn targets_in_radius(
    world: &World,
    index: &dyn SpatialIndex,
    center: Vec3,
    radius: f32,
    exclude: &[Entity],
) -> Vec<Entity> {
    index
        .collect(world, center, radius)
        .into_iter()
        .filter(|&e| is_damageable(world, e) && !exclude.contains(&e))
        .collect()
}

/// Living, damageable entities whose position lies inside `zone`
pub fn targets_in_box(
    world: &World,
    index: &dyn SpatialIndex,
    zone: &BoundingBox,
    exclude: &[Entity],
) -> Vec<Entity> {
    let center = (zone.min + zone.max) * 0.5;
    let reach = zone.min.distance(&zone.max) * 0.5;
    index
        .collect(world, center, reach)
        .into_iter()
        .filter(|&e| is_damageable(world, e) && !exclude.contains(&e))
        .filter(|&e| {
            world
                .get::<&Position>(e)
                .map(|p| zone.contains(&p.0))
                .unwrap_or(false)
        })
        .collect()
}

fn is_damageable(world: &World, entity: Entity) -> bool {
    world.contains(entity)
        && world
            .get::<&Health>(entity)
            .map(|h| !h.is_dead())
            .unwrap_or(false)
}

/// Apply one hit through the damage collaborator
pub fn deal_damage(ctx: &mut DungeonCtx<'_>, target: Entity, damage: DamageEvent) {
    ctx.services.damage.apply(ctx.world, target, damage);
}

/// Spawn the visual body of a trap at `position`
pub fn spawn_trap_model(world: &mut World, spawner: Entity, model: &str, position: Vec3) -> Entity {
    world.spawn((
        Position(position),
        TrapModel {
            model: model.to_string(),
        },
        SpawnedEntity { spawner },
    ))
}

/// Despawn an entity a trap created, if it still exists
pub fn despawn_spawned(world: &mut World, spawned: Option<Entity>) {
    if let Some(entity) = spawned {
        if world.despawn(entity).is_err() {
            log::debug!("Spawned entity {:?} was already gone", entity);
        }
    }
}

/// The spawned entity, if it is still alive
pub fn live_entity(world: &World, spawned: Option<Entity>) -> Option<Entity> {
    spawned.filter(|&e| world.contains(e))
}
