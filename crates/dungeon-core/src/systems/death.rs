//! Death handling - dungeoneers never really die, they go back to the dungeon
//! spawn.

use hecs::Entity;

use super::membership::respawn_player;
use super::{network_of, player_name, position_of, reset};
use crate::components::*;
use crate::engine::DungeonCtx;

/// Mark dead players, then cancel the death of every dungeoneer.
///
/// A dead relic holder resets the dungeon: every dungeoneer is respawned and
/// nobody holds the relic anymore. Anyone else just respawns at their spawn.
pub fn death_system(ctx: &mut DungeonCtx<'_>) {
    let newly_dead: Vec<Entity> = ctx
        .world
        .query::<(&Player, &Health)>()
        .without::<&Dead>()
        .iter()
        .filter(|(_, (_, health))| health.is_dead())
        .map(|(entity, _)| entity)
        .collect();
    for player in newly_dead {
        let _ = ctx.world.insert_one(player, Dead);
    }

    let dying: Vec<(Entity, bool, Vec3)> = ctx
        .world
        .query::<(&Dungeoneer, &Dead)>()
        .iter()
        .map(|(entity, (d, _))| (entity, d.relic_holder, d.spawn_position))
        .collect();

    for (player, relic_holder, spawn) in dying {
        // Already handled by an earlier holder's reset this tick
        if ctx.world.remove_one::<Dead>(player).is_err() {
            continue;
        }
        if relic_holder {
            relic_holder_died(ctx, player, spawn);
        } else {
            log::info!("Dungeoneer '{}' died, respawning", player_name(ctx.world, player));
            respawn_player(ctx.world, player, spawn);
        }
    }
}

fn relic_holder_died(ctx: &mut DungeonCtx<'_>, player: Entity, fallback_spawn: Vec3) {
    let Some(network) = network_of(ctx.world, player) else {
        log::warn!(
            "Relic holder '{}' died outside any known dungeon",
            player_name(ctx.world, player)
        );
        respawn_player(ctx.world, player, fallback_spawn);
        return;
    };

    log::info!(
        "Relic holder '{}' died, resetting dungeon",
        player_name(ctx.world, player)
    );
    reset(ctx, network);

    let spawn = position_of(ctx.world, network).and_then(|controller| {
        ctx.world
            .get::<&DungeonNetwork>(network)
            .ok()
            .map(|n| n.spawn_or(controller))
    });
    let spawn = spawn.unwrap_or(fallback_spawn);

    let members = ctx
        .world
        .get::<&DungeonNetwork>(network)
        .map(|n| n.dungeoneers().to_vec())
        .unwrap_or_default();
    for member in members {
        if let Ok(mut d) = ctx.world.get::<&mut Dungeoneer>(member) {
            d.relic_holder = false;
        } else {
            continue;
        }
        let _ = ctx.world.remove_one::<Dead>(member);
        respawn_player(ctx.world, member, spawn);
    }
    if let Ok(mut d) = ctx.world.get::<&mut Dungeoneer>(player) {
        d.relic_holder = false;
    }
    if let Ok(mut n) = ctx.world.get::<&mut DungeonNetwork>(network) {
        n.artifact_holder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DungeonEngine;
    use crate::systems::{activate, add_dungeoneer};

    fn player(engine: &mut DungeonEngine, name: &str, x: f32) -> Entity {
        engine.world.spawn((
            Position::new(x, 0.0, 0.0),
            Player::new(name),
            Health::new(20.0),
        ))
    }

    fn kill(engine: &mut DungeonEngine, player: Entity) {
        engine.world.get::<&mut Health>(player).unwrap().current = 0.0;
    }

    fn setup() -> (DungeonEngine, Entity, Entity, Entity) {
        let mut engine = DungeonEngine::new();
        let network = engine.world.spawn((
            Position::new(0.0, 0.0, 0.0),
            DungeonNetwork::new("crypt").with_spawn_position(Vec3::new(0.0, 2.0, 0.0)),
        ));
        let holder = player(&mut engine, "ada", 30.0);
        let friend = player(&mut engine, "bo", 40.0);
        {
            let mut ctx = engine.ctx();
            add_dungeoneer(&mut ctx, network, holder, true);
            add_dungeoneer(&mut ctx, network, friend, false);
            activate(&mut ctx, network, Some(holder));
        }
        (engine, network, holder, friend)
    }

    #[test]
    fn test_outsider_death_is_left_alone() {
        let mut engine = DungeonEngine::new();
        let outsider = player(&mut engine, "cy", 0.0);
        kill(&mut engine, outsider);

        death_system(&mut engine.ctx());

        assert!(engine.world.get::<&Dead>(outsider).is_ok());
        assert_eq!(engine.world.get::<&Health>(outsider).unwrap().current, 0.0);
    }

    #[test]
    fn test_dungeoneer_respawns_at_spawn() {
        let (mut engine, network, _holder, friend) = setup();
        kill(&mut engine, friend);

        death_system(&mut engine.ctx());

        assert!(engine.world.get::<&Dead>(friend).is_err());
        assert_eq!(engine.world.get::<&Health>(friend).unwrap().current, 20.0);
        assert_eq!(
            engine.world.get::<&Position>(friend).unwrap().0,
            Vec3::new(0.0, 2.0, 0.0)
        );
        assert!(engine.world.get::<&DungeonNetwork>(network).unwrap().active);
    }

    #[test]
    fn test_relic_holder_death_resets_dungeon() {
        let (mut engine, network, holder, friend) = setup();
        kill(&mut engine, holder);

        death_system(&mut engine.ctx());

        let n = engine.world.get::<&DungeonNetwork>(network).unwrap();
        assert!(!n.active);
        assert!(!n.triggered);
        assert!(n.artifact_holder.is_none());
        drop(n);
        for p in [holder, friend] {
            assert!(!engine.world.get::<&Dungeoneer>(p).unwrap().relic_holder);
            assert_eq!(
                engine.world.get::<&Position>(p).unwrap().0,
                Vec3::new(0.0, 2.0, 0.0)
            );
        }
        assert_eq!(engine.world.get::<&Health>(holder).unwrap().current, 20.0);
    }
}
