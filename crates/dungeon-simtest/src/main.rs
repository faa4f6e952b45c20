//! Dungeon Headless Scenario Harness
//!
//! Builds scripted dungeons on the in-world collaborators and steps the
//! engine. Runs entirely in-process: no game server, no rendering.
//!
//! Usage:
//!   cargo run -p dungeon-simtest
//!   cargo run -p dungeon-simtest -- --verbose

use dungeon_core::prelude::*;
use dungeon_core::services::PositionScan;
use dungeon_core::systems::{assign_entrance, assign_network, discover, network_info};
use hecs::Entity;

const TICK: f32 = 0.05;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Dungeon Scenario Harness ===\n");

    let mut results = Vec::new();

    // 1. Discovery
    results.extend(validate_discovery(verbose));

    // 2. Merge
    results.extend(validate_merge(verbose));

    // 3. Boss room encounter
    results.extend(validate_encounter(verbose));

    // 4. Trap behaviors
    results.extend(validate_traps(verbose));

    // 5. Leaving the dungeon
    results.extend(validate_departures(verbose));

    // 6. Operator commands and persistence
    results.extend(validate_operator(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Scene helpers ───────────────────────────────────────────────────────

fn spawn_network(engine: &mut DungeonEngine, id: &str, at: Vec3) -> Entity {
    engine.world.spawn((Position(at), DungeonNetwork::new(id)))
}

fn spawn_spawner(engine: &mut DungeonEngine, action: &str, at: Vec3) -> Entity {
    engine.world.spawn((Position(at), Spawner::new(action)))
}

fn spawn_player(engine: &mut DungeonEngine, name: &str, at: Vec3) -> Entity {
    engine.world.spawn((
        Position(at),
        Player::new(name),
        Health::new(100.0),
        Hitbox::default(),
        RespawnPoints(vec![Vec3::new(0.0, 64.0, 0.0)]),
    ))
}

fn run(engine: &mut DungeonEngine, seconds: f32) {
    let ticks = (seconds / TICK).ceil() as usize;
    for _ in 0..ticks {
        engine.update(TICK);
    }
}

fn health(engine: &DungeonEngine, entity: Entity) -> f32 {
    engine
        .world
        .get::<&Health>(entity)
        .map(|h| h.current)
        .unwrap_or(0.0)
}

fn count<T: hecs::Component>(engine: &DungeonEngine) -> usize {
    engine.world.query::<&T>().iter().count()
}

// ── 1. Discovery ────────────────────────────────────────────────────────

fn validate_discovery(verbose: bool) -> Vec<TestResult> {
    println!("--- Discovery ---");
    let mut results = Vec::new();

    // A winding corridor of 12 spawners, 8 units apart, 96 units long
    let mut engine = DungeonEngine::with_seed(1);
    let corridor: Vec<Entity> = (1..=12)
        .map(|i| {
            let x = i as f32 * 8.0;
            let z = if i % 2 == 0 { 3.0 } else { 0.0 };
            spawn_spawner(&mut engine, "hammer", Vec3::new(x, 0.0, z))
        })
        .collect();
    let stray = spawn_spawner(&mut engine, "hammer", Vec3::new(-200.0, 0.0, 200.0));

    let found = discover(
        &engine.world,
        &PositionScan,
        Vec3::ZERO,
        10.0,
        |w, e| w.get::<&Spawner>(e).is_ok(),
    );
    let complete = corridor.iter().all(|e| found.contains(e));
    results.push(TestResult {
        name: "discovery_chain_complete".into(),
        passed: complete && found.len() == corridor.len(),
        detail: format!("{}/{} corridor spawners found", found.len(), corridor.len()),
    });
    results.push(TestResult {
        name: "discovery_excludes_stray".into(),
        passed: !found.contains(&stray),
        detail: "spawner 280 units away is not part of the network".into(),
    });

    let network = spawn_network(&mut engine, "corridor", Vec3::ZERO);
    let first = engine.register(network);
    let second = engine.register(network);
    results.push(TestResult {
        name: "discovery_register_idempotent".into(),
        passed: first == second && first == corridor.len(),
        detail: format!("first={} second={}", first, second),
    });

    if verbose {
        println!("  Discovered {} spawners from the origin", found.len());
    }

    results
}

// ── 2. Merge ────────────────────────────────────────────────────────────

fn validate_merge(_verbose: bool) -> Vec<TestResult> {
    println!("--- Merge ---");
    let mut results = Vec::new();

    // Same controller pasted twice
    let mut engine = DungeonEngine::with_seed(2);
    spawn_network(&mut engine, "vault", Vec3::ZERO);
    spawn_network(&mut engine, "vault", Vec3::new(0.3, 0.0, 0.3));
    for i in 1..=4 {
        spawn_spawner(&mut engine, "laser", Vec3::new(i as f32 * 5.0, 0.0, 0.0));
    }
    engine.update(TICK);
    let survivor = engine.find_network_by_id("vault");
    let spawners = survivor
        .and_then(|n| engine.network_info(n))
        .map(|i| i.spawner_count)
        .unwrap_or(0);
    results.push(TestResult {
        name: "merge_duplicate_collapses".into(),
        passed: engine.network_count() == 1 && spawners == 4,
        detail: format!("{} networks, {} spawners", engine.network_count(), spawners),
    });

    // Unnamed helper controller folds into the named one
    let mut engine = DungeonEngine::with_seed(2);
    let named = spawn_network(&mut engine, "vault", Vec3::ZERO);
    spawn_network(&mut engine, "", Vec3::new(25.0, 0.0, 0.0));
    engine.update(TICK);
    results.push(TestResult {
        name: "merge_unnamed_absorbed".into(),
        passed: engine.network_count() == 1 && engine.world.contains(named),
        detail: format!("{} networks after registration", engine.network_count()),
    });

    // Two named controllers too close together
    let mut engine = DungeonEngine::with_seed(2);
    let a = spawn_network(&mut engine, "north", Vec3::ZERO);
    spawn_network(&mut engine, "south", Vec3::new(10.0, 0.0, 0.0));
    let result = engine.check_and_merge(a);
    results.push(TestResult {
        name: "merge_conflict_reported".into(),
        passed: result.conflict && !result.merged && engine.network_count() == 2,
        detail: format!(
            "conflict={} merged={} conflicts={}",
            result.conflict,
            result.merged,
            result.conflicts.len()
        ),
    });

    results
}

// ── 3. Encounter ────────────────────────────────────────────────────────

fn validate_encounter(verbose: bool) -> Vec<TestResult> {
    println!("--- Boss Room Encounter ---");
    let mut results = Vec::new();

    let mut engine = DungeonEngine::with_seed(3);
    let network = spawn_network(&mut engine, "catacomb", Vec3::ZERO);
    spawn_spawner(&mut engine, "archer", Vec3::new(15.0, 0.0, 0.0));
    spawn_spawner(&mut engine, "brute", Vec3::new(20.0, 0.0, 0.0));
    let ada = spawn_player(&mut engine, "ada", Vec3::new(2.0, 0.0, 0.0));

    engine.update(TICK);
    results.push(TestResult {
        name: "encounter_player_claimed".into(),
        passed: engine.world.get::<&Dungeoneer>(ada).is_ok(),
        detail: "player inside the trigger radius becomes a dungeoneer".into(),
    });

    run(&mut engine, 0.5);
    let waiting = engine.network_info(network).map(|i| !i.active).unwrap_or(false);
    run(&mut engine, 1.0);
    let info = engine.network_info(network);
    let started = info.as_ref().map(|i| i.active && i.triggered).unwrap_or(false);
    results.push(TestResult {
        name: "encounter_delayed_activation".into(),
        passed: waiting && started,
        detail: format!("inactive during delay={} active after={}", waiting, started),
    });

    let monsters = count::<Npc>(&engine);
    results.push(TestResult {
        name: "encounter_monsters_spawned".into(),
        passed: monsters == 2,
        detail: format!("{} monsters", monsters),
    });

    let holder = info.and_then(|i| i.artifact_holder);
    results.push(TestResult {
        name: "encounter_first_arrival_holds_relic".into(),
        passed: holder == Some(ada),
        detail: format!("holder={:?}", holder),
    });

    engine.relic_lost(ada);
    let info = engine.network_info(network);
    let reset = info
        .map(|i| !i.active && i.dungeoneer_count == 0)
        .unwrap_or(false);
    results.push(TestResult {
        name: "encounter_relic_loss_resets".into(),
        passed: reset && count::<Npc>(&engine) == 0,
        detail: format!("monsters left: {}", count::<Npc>(&engine)),
    });

    if verbose {
        println!("  Encounter ran for {:.2}s", engine.sim_time());
    }

    results
}

// ── 4. Traps ────────────────────────────────────────────────────────────

/// Network with one spawner next to a relic-holding player
fn trap_scene(action: &str, spawner_at: Vec3, player_at: Vec3) -> (DungeonEngine, Entity) {
    let mut engine = DungeonEngine::with_seed(4);
    let network = spawn_network(&mut engine, "trap_room", Vec3::ZERO);
    spawn_spawner(&mut engine, action, spawner_at);
    let player = spawn_player(&mut engine, "ada", player_at);
    engine.trigger_pedestal(network, player);
    (engine, player)
}

fn validate_traps(verbose: bool) -> Vec<TestResult> {
    println!("--- Trap Behaviors ---");
    let mut results = Vec::new();

    // Press: one hit per cycle
    let (mut engine, player) = trap_scene("hydraulic_press", Vec3::new(3.0, 0.0, 0.0), Vec3::new(3.5, 0.0, 0.0));
    run(&mut engine, 3.0);
    let hp = health(&engine, player);
    results.push(TestResult {
        name: "trap_press_single_hit".into(),
        passed: hp == 75.0,
        detail: format!("health after one press: {:.1}", hp),
    });

    // Hammer: swings through its zone
    let (mut engine, player) = trap_scene("hammer", Vec3::new(3.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0));
    run(&mut engine, 1.0);
    let hp = health(&engine, player);
    results.push(TestResult {
        name: "trap_hammer_hits".into(),
        passed: hp < 100.0,
        detail: format!("health after a swing: {:.1}", hp),
    });

    // Laser: fires projectiles on its interval
    let (mut engine, _) = trap_scene("laser", Vec3::new(3.0, 0.0, 0.0), Vec3::new(8.0, 0.0, 0.0));
    run(&mut engine, 4.5);
    let shots = count::<Projectile>(&engine);
    results.push(TestResult {
        name: "trap_laser_fires".into(),
        passed: shots >= 2,
        detail: format!("{} projectiles in 4.5s", shots),
    });

    // Saw blade: surfaces and cuts
    let (mut engine, player) = trap_scene("saw_blade", Vec3::new(3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0));
    run(&mut engine, 2.5);
    let hp = health(&engine, player);
    results.push(TestResult {
        name: "trap_saw_blade_cuts".into(),
        passed: hp < 100.0,
        detail: format!("health after 2.5s: {:.1}", hp),
    });

    if verbose {
        println!("  Registry: {}", DungeonEngine::new().registry.ids().join(", "));
    }

    results
}

// ── 5. Departures ───────────────────────────────────────────────────────

fn validate_departures(_verbose: bool) -> Vec<TestResult> {
    println!("--- Escape, Death & Disconnect ---");
    let mut results = Vec::new();

    // Relic holder escapes through the entrance
    let mut engine = DungeonEngine::with_seed(5);
    let network = spawn_network(&mut engine, "crypt", Vec3::ZERO);
    engine.world.spawn((
        Position::new(0.0, 0.0, 30.0),
        DungeonEntrance::new("crypt"),
    ));
    let ada = spawn_player(&mut engine, "ada", Vec3::new(1.0, 0.0, 0.0));
    run(&mut engine, 2.0);
    if let Ok(mut pos) = engine.world.get::<&mut Position>(ada) {
        pos.0 = Vec3::new(0.0, 0.0, 30.0);
    }
    engine.update(TICK);
    if let Ok(mut pos) = engine.world.get::<&mut Position>(ada) {
        pos.0 = Vec3::new(0.0, 0.0, 100.0);
    }
    engine.update(TICK);
    let ended = engine
        .network_info(network)
        .map(|i| !i.active && i.dungeoneer_count == 0)
        .unwrap_or(false);
    let restored = engine
        .world
        .get::<&RespawnPoints>(ada)
        .map(|p| p.0 == vec![Vec3::new(0.0, 64.0, 0.0)])
        .unwrap_or(false);
    results.push(TestResult {
        name: "departure_escape_ends_dungeon".into(),
        passed: ended && restored,
        detail: format!("ended={} respawn restored={}", ended, restored),
    });

    // Relic holder dies: everyone back to the spawn
    let mut engine = DungeonEngine::with_seed(5);
    let network = spawn_network(&mut engine, "crypt", Vec3::ZERO);
    let ada = spawn_player(&mut engine, "ada", Vec3::new(1.0, 0.0, 0.0));
    run(&mut engine, 2.0);
    let bo = spawn_player(&mut engine, "bo", Vec3::new(4.0, 0.0, 0.0));
    engine.update(TICK);
    if let Ok(mut h) = engine.world.get::<&mut Health>(ada) {
        h.current = 0.0;
    }
    engine.update(TICK);
    let at_spawn = [ada, bo].iter().all(|&p| {
        engine
            .world
            .get::<&Position>(p)
            .map(|pos| pos.0 == Vec3::ZERO)
            .unwrap_or(false)
    });
    let inactive = engine.network_info(network).map(|i| !i.active).unwrap_or(false);
    results.push(TestResult {
        name: "departure_holder_death_resets".into(),
        passed: at_spawn && inactive && health(&engine, ada) == 100.0,
        detail: format!("all at spawn={} inactive={}", at_spawn, inactive),
    });

    // Last dungeoneer disconnects
    let mut engine = DungeonEngine::with_seed(5);
    let network = spawn_network(&mut engine, "crypt", Vec3::ZERO);
    let ada = spawn_player(&mut engine, "ada", Vec3::new(1.0, 0.0, 0.0));
    run(&mut engine, 2.0);
    engine.player_disconnected(ada);
    let inactive = engine.network_info(network).map(|i| !i.active).unwrap_or(false);
    results.push(TestResult {
        name: "departure_disconnect_resets".into(),
        passed: inactive && !engine.world.contains(ada),
        detail: format!("inactive={}", inactive),
    });

    results
}

// ── 6. Operator ─────────────────────────────────────────────────────────

fn validate_operator(_verbose: bool) -> Vec<TestResult> {
    println!("--- Operator & Persistence ---");
    let mut results = Vec::new();

    let mut engine = DungeonEngine::with_seed(6);
    let controller = engine.world.spawn((Position::new(100.0, 0.0, 100.0),));
    let door = engine.world.spawn((Position::new(100.0, 0.0, 140.0),));
    spawn_spawner(&mut engine, "beam", Vec3::new(104.0, 0.0, 100.0));

    let id = assign_network(&mut engine.ctx(), controller, None);
    let entrance = assign_entrance(&mut engine.ctx(), door, None);
    let linked = matches!((&id, &entrance), (Ok(a), Ok(b)) if a == b);
    results.push(TestResult {
        name: "operator_assign".into(),
        passed: linked,
        detail: format!("network={:?} entrance={:?}", id, entrance),
    });

    let again = assign_network(&mut engine.ctx(), controller, Some("other"));
    results.push(TestResult {
        name: "operator_rejects_second_role".into(),
        passed: again.is_err(),
        detail: match again {
            Ok(id) => format!("unexpectedly assigned '{}'", id),
            Err(e) => e.to_string(),
        },
    });

    engine.update(TICK);
    let info = network_info(&engine.world, controller);
    results.push(TestResult {
        name: "operator_info".into(),
        passed: info
            .as_ref()
            .map(|i| i.registered && i.spawner_count == 1 && i.has_entrance)
            .unwrap_or(false),
        detail: format!("{:?}", info.map(|i| (i.dungeon_id, i.spawner_count))),
    });

    let mut buffer = Vec::new();
    let saved = engine.save(&mut buffer);
    let mut restored = DungeonEngine::with_seed(7);
    let loaded = restored.load(&buffer[..]);
    let found = id
        .as_ref()
        .ok()
        .and_then(|id| restored.find_network_by_id(id))
        .is_some();
    results.push(TestResult {
        name: "operator_save_load".into(),
        passed: saved.is_ok() && loaded.is_ok() && found,
        detail: format!("{} bytes, network found={}", buffer.len(), found),
    });

    results
}
