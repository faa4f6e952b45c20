//! Spawner ticking.

use hecs::Entity;

use super::position_of;
use crate::components::*;
use crate::engine::DungeonCtx;

/// Advance spawner behaviors by `dt`.
///
/// Active networks tick their armed spawners, in spawner-list order, while a
/// dungeoneer is within `spawner_tick_radius`. Spawners that are disarmed but
/// still winding down keep ticking until they finish, whatever the network's
/// state.
pub fn spawner_tick_system(ctx: &mut DungeonCtx<'_>, dt: f32) {
    let networks: Vec<(Entity, bool)> = ctx
        .world
        .query::<&DungeonNetwork>()
        .iter()
        .filter(|(_, n)| n.registered)
        .map(|(entity, n)| (entity, n.active))
        .collect();

    for (network, active) in networks {
        let (spawners, members) = match ctx.world.get::<&DungeonNetwork>(network) {
            Ok(n) => (n.spawners().to_vec(), n.dungeoneers().to_vec()),
            Err(_) => continue,
        };
        if active {
            let nearby: Vec<Vec3> = members
                .into_iter()
                .filter_map(|p| position_of(ctx.world, p))
                .collect();
            tick_active(ctx, &spawners, &nearby, dt);
        } else {
            tick_winding_down(ctx, &spawners, dt);
        }
    }
}

fn tick_active(ctx: &mut DungeonCtx<'_>, spawners: &[Entity], dungeoneers: &[Vec3], dt: f32) {
    let radius_sq = ctx.config.spawner_tick_radius * ctx.config.spawner_tick_radius;
    let registry = ctx.registry;
    for &spawner in spawners {
        let (id, armed) = match ctx.world.get::<&Spawner>(spawner) {
            Ok(s) => (s.execution_id.clone(), s.active),
            Err(_) => continue,
        };
        let Some(behavior) = registry.get(&id) else {
            continue;
        };
        if !armed {
            // Toggled off on its own; let it reach its rest phase
            if behavior.is_running(ctx.world, spawner) {
                behavior.tick(ctx, spawner, dt);
            }
            continue;
        }
        let Some(at) = position_of(ctx.world, spawner) else {
            continue;
        };
        if dungeoneers.iter().any(|d| d.distance_squared(&at) <= radius_sq) {
            behavior.tick(ctx, spawner, dt);
        }
    }
}

fn tick_winding_down(ctx: &mut DungeonCtx<'_>, spawners: &[Entity], dt: f32) {
    let registry = ctx.registry;
    for &spawner in spawners {
        let id = match ctx.world.get::<&Spawner>(spawner) {
            Ok(s) => s.execution_id.clone(),
            Err(_) => continue,
        };
        let Some(behavior) = registry.get(&id) else {
            continue;
        };
        if behavior.is_running(ctx.world, spawner) {
            behavior.tick(ctx, spawner, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use hecs::World;

    use super::*;
    use crate::engine::DungeonEngine;
    use crate::spawnable::{Spawnable, SpawnableRegistry};
    use crate::systems::{activate, add_dungeoneer, deactivate, deactivate_spawner};

    /// Counts ticks and keeps running for a fixed number of them after deactivation
    struct Counter {
        ticks: Rc<Cell<u32>>,
        wind_down: Rc<Cell<u32>>,
    }

    impl Spawnable for Counter {
        fn id(&self) -> &'static str {
            "counter"
        }
        fn register(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {}
        fn activate(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {}
        fn deactivate(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {
            self.wind_down.set(2);
        }
        fn cleanup(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {}
        fn tick(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity, _dt: f32) {
            self.ticks.set(self.ticks.get() + 1);
            self.wind_down.set(self.wind_down.get().saturating_sub(1));
        }
        fn is_running(&self, _world: &World, _spawner: Entity) -> bool {
            self.wind_down.get() > 0
        }
    }

    struct Setup {
        engine: DungeonEngine,
        network: Entity,
        player: Entity,
        ticks: Rc<Cell<u32>>,
    }

    fn setup() -> Setup {
        let ticks = Rc::new(Cell::new(0));
        let mut registry = SpawnableRegistry::new();
        registry
            .register(Box::new(Counter {
                ticks: ticks.clone(),
                wind_down: Rc::new(Cell::new(0)),
            }))
            .unwrap();
        let mut engine = DungeonEngine::new();
        engine.registry = registry;

        let network = engine
            .world
            .spawn((Position::new(0.0, 0.0, 0.0), DungeonNetwork::new("crypt")));
        engine
            .world
            .spawn((Position::new(5.0, 0.0, 0.0), Spawner::new("counter")));
        let player = engine
            .world
            .spawn((Position::new(6.0, 0.0, 0.0), Player::new("ada")));
        {
            let mut ctx = engine.ctx();
            add_dungeoneer(&mut ctx, network, player, false);
            activate(&mut ctx, network, None);
        }
        Setup {
            engine,
            network,
            player,
            ticks,
        }
    }

    #[test]
    fn test_ticks_near_dungeoneer() {
        let mut s = setup();
        spawner_tick_system(&mut s.engine.ctx(), 0.05);
        spawner_tick_system(&mut s.engine.ctx(), 0.05);
        assert_eq!(s.ticks.get(), 2);
    }

    #[test]
    fn test_no_ticks_when_dungeoneers_far() {
        let mut s = setup();
        s.engine.world.get::<&mut Position>(s.player).unwrap().0.x = 500.0;
        spawner_tick_system(&mut s.engine.ctx(), 0.05);
        assert_eq!(s.ticks.get(), 0);
    }

    #[test]
    fn test_inactive_network_winds_down() {
        let mut s = setup();
        deactivate(&mut s.engine.ctx(), s.network);

        for _ in 0..5 {
            spawner_tick_system(&mut s.engine.ctx(), 0.05);
        }

        assert_eq!(s.ticks.get(), 2);
    }

    #[test]
    fn test_disarmed_spawner_winds_down_in_active_network() {
        let mut s = setup();
        let trap = s.engine.world.get::<&DungeonNetwork>(s.network).unwrap().spawners()[0];
        deactivate_spawner(&mut s.engine.ctx(), trap);

        for _ in 0..5 {
            spawner_tick_system(&mut s.engine.ctx(), 0.05);
        }

        assert!(s.engine.world.get::<&DungeonNetwork>(s.network).unwrap().active);
        assert_eq!(s.ticks.get(), 2);
    }
}
