//! Entrance area - detects dungeoneers leaving through the entrance.

use std::collections::HashSet;

use hecs::Entity;

use super::membership::network_is_empty_and_active;
use super::{deactivate, detach_all, detach_dungeoneer, network_of, player_name, position_of};
use crate::components::*;
use crate::engine::DungeonCtx;

/// Track players inside every entrance. A dungeoneer who was inside last tick
/// and is gone now has escaped.
pub fn entrance_system(ctx: &mut DungeonCtx<'_>) {
    let entrances: Vec<Entity> = ctx
        .world
        .query::<(&DungeonEntrance, &Position)>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();

    for entrance in entrances {
        let Some(center) = position_of(ctx.world, entrance) else {
            continue;
        };
        let Ok((dungeon_id, radius, last_tick)) = ctx.world.get::<&DungeonEntrance>(entrance).map(|e| {
            (
                e.dungeon_id.clone(),
                e.trigger_radius,
                e.players_inside_last_tick.clone(),
            )
        }) else {
            continue;
        };

        let inside: HashSet<Entity> = ctx
            .services
            .spatial
            .collect(ctx.world, center, radius)
            .into_iter()
            .filter(|&e| ctx.world.get::<&Player>(e).is_ok())
            .collect();

        for &player in last_tick.difference(&inside) {
            player_left_entrance(ctx, &dungeon_id, player);
        }

        if let Ok(mut e) = ctx.world.get::<&mut DungeonEntrance>(entrance) {
            e.players_inside = inside;
            e.update_last_tick_tracking();
        }
    }
}

fn player_left_entrance(ctx: &mut DungeonCtx<'_>, dungeon_id: &str, player: Entity) {
    if !ctx.world.contains(player) {
        return;
    }
    let relic_holder = match ctx.world.get::<&Dungeoneer>(player) {
        Ok(d) if d.dungeon_id == dungeon_id => d.relic_holder,
        _ => return,
    };
    let network = network_of(ctx.world, player);

    log::info!(
        "Player '{}' escaped dungeon '{}' (relic holder: {})",
        player_name(ctx.world, player),
        dungeon_id,
        relic_holder
    );
    detach_dungeoneer(ctx, player);

    let Some(network) = network else {
        if relic_holder {
            log::warn!("Relic holder escaped but dungeon '{}' is gone", dungeon_id);
        }
        return;
    };
    if relic_holder {
        log::info!("Relic holder escaped, dungeon '{}' complete", dungeon_id);
        deactivate(ctx, network);
        detach_all(ctx, network);
    } else if network_is_empty_and_active(ctx.world, network) {
        log::info!("All dungeoneers left dungeon '{}', deactivating", dungeon_id);
        deactivate(ctx, network);
    }
}
