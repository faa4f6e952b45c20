//! Dungeon engine - main entry point for running the simulation

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::components::*;
use crate::config::DungeonConfig;
use crate::services::Services;
use crate::spawnable::SpawnableRegistry;
use crate::systems::*;

/// Borrowed view of the engine handed to systems and spawnables
pub struct DungeonCtx<'a> {
    pub world: &'a mut World,
    pub registry: &'a SpawnableRegistry,
    pub services: &'a mut Services,
    pub config: &'a DungeonConfig,
    pub rng: &'a mut StdRng,
}

/// Main dungeon engine
pub struct DungeonEngine {
    /// ECS world containing all entities
    pub world: World,
    /// Behaviors selectable by spawner execution id
    pub registry: SpawnableRegistry,
    /// Game-side collaborators
    pub services: Services,
    pub config: DungeonConfig,
    /// Players claimed by a boss room during the current tick
    pub claims: PendingDungeoneerClaims,

    rng: StdRng,
    /// Simulation time in seconds since start
    sim_time: f64,
}

impl DungeonEngine {
    /// Create an empty engine with the default behaviors and collaborators
    pub fn new() -> Self {
        Self::build(StdRng::from_entropy())
    }

    /// Same as [`new`](Self::new) with a deterministic random source
    pub fn with_seed(seed: u64) -> Self {
        Self::build(StdRng::seed_from_u64(seed))
    }

    fn build(rng: StdRng) -> Self {
        Self {
            world: World::new(),
            registry: SpawnableRegistry::with_defaults(),
            services: Services::default(),
            config: DungeonConfig::default(),
            claims: PendingDungeoneerClaims::new(),
            rng,
            sim_time: 0.0,
        }
    }

    pub fn with_config(mut self, config: DungeonConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn with_registry(mut self, registry: SpawnableRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Lend the engine's parts to a system
    pub fn ctx(&mut self) -> DungeonCtx<'_> {
        self.split().0
    }

    fn split(&mut self) -> (DungeonCtx<'_>, &mut PendingDungeoneerClaims) {
        (
            DungeonCtx {
                world: &mut self.world,
                registry: &self.registry,
                services: &mut self.services,
                config: &self.config,
                rng: &mut self.rng,
            },
            &mut self.claims,
        )
    }

    /// Advance the simulation by `delta_seconds`
    pub fn update(&mut self, delta_seconds: f32) {
        self.sim_time += delta_seconds as f64;
        let (mut ctx, claims) = self.split();

        // Claims only deduplicate within one tick
        claims.clear();

        registration_system(&mut ctx);
        boss_room_system(&mut ctx, claims, delta_seconds);
        entrance_system(&mut ctx);
        death_system(&mut ctx);
        spawner_tick_system(&mut ctx, delta_seconds);
    }

    /// Simulation time in seconds
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn register(&mut self, network: Entity) -> usize {
        register(&mut self.ctx(), network)
    }

    pub fn activate(&mut self, network: Entity, holder: Option<Entity>) -> usize {
        activate(&mut self.ctx(), network, holder)
    }

    pub fn deactivate(&mut self, network: Entity) -> usize {
        deactivate(&mut self.ctx(), network)
    }

    pub fn reset(&mut self, network: Entity) {
        reset(&mut self.ctx(), network)
    }

    pub fn check_and_merge(&mut self, network: Entity) -> MergeResult {
        check_and_merge(&mut self.ctx(), network)
    }

    pub fn relic_picked_up(&mut self, player: Entity) -> bool {
        relic_picked_up(&mut self.ctx(), player)
    }

    pub fn relic_lost(&mut self, player: Entity) -> bool {
        relic_lost(&mut self.ctx(), player)
    }

    pub fn trigger_pedestal(&mut self, network: Entity, player: Entity) -> bool {
        trigger_pedestal(&mut self.ctx(), network, player)
    }

    pub fn player_disconnected(&mut self, player: Entity) {
        player_disconnected(&mut self.ctx(), player)
    }

    /// Nearest network within `nearest_search_radius`
    pub fn find_nearest_network(&self, position: Vec3) -> Option<Entity> {
        find_nearest_network(
            &self.world,
            self.services.spatial.as_ref(),
            position,
            self.config.nearest_search_radius,
        )
    }

    pub fn find_network_by_id(&self, dungeon_id: &str) -> Option<Entity> {
        find_network_by_id(&self.world, dungeon_id)
    }

    pub fn network_info(&self, network: Entity) -> Option<NetworkInfo> {
        network_info(&self.world, network)
    }

    /// Count network controllers
    pub fn network_count(&self) -> usize {
        self.world.query::<&DungeonNetwork>().iter().count()
    }

    /// Count players currently inside some dungeon
    pub fn dungeoneer_count(&self) -> usize {
        self.world.query::<&Dungeoneer>().iter().count()
    }

    /// Save the dungeon state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), crate::persistence::SaveError> {
        crate::persistence::save_world(writer, &self.world, self.sim_time)
    }

    /// Load dungeon state from a reader.
    ///
    /// Every network comes back unregistered; the next update rediscovers its
    /// spawners and entrance.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), crate::persistence::SaveError> {
        let loaded = crate::persistence::load_world(reader)?;
        self.world = loaded.world;
        self.sim_time = loaded.sim_time;
        self.claims.clear();
        Ok(())
    }
}

impl Default for DungeonEngine {
    fn default() -> Self {
        Self::new()
    }
}
