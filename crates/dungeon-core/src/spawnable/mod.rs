//! Spawnable behaviors - what a spawner does once its network activates.
//!
//! A spawner's `execution_id` selects one [`Spawnable`] from the
//! [`SpawnableRegistry`]. Each behavior keeps its runtime state as a
//! component on the spawner entity and advances it in [`Spawnable::tick`].

mod beam;
mod hammer;
mod laser;
mod monster;
mod press;
mod saw_blade;
mod targets;

use std::collections::HashMap;

use hecs::{Entity, World};
use thiserror::Error;

use crate::engine::DungeonCtx;

pub use beam::*;
pub use hammer::*;
pub use laser::*;
pub use monster::*;
pub use press::*;
pub use saw_blade::*;
pub use targets::*;

/// Per-spawner behavior.
///
/// Every hook tolerates a despawned spawner and missing state.
pub trait Spawnable {
    /// Registry key, matched against `Spawner::execution_id`
    fn id(&self) -> &'static str;

    /// Attach runtime state, or reset it when already present
    fn register(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity);

    /// Spawn or arm the trap's manifestation
    fn activate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity);

    /// Ask the trap to wind down at its next safe point
    fn deactivate(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity);

    fn reset(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity) {
        self.deactivate(ctx, spawner);
        self.activate(ctx, spawner);
    }

    /// Remove the manifestation immediately and detach runtime state
    fn cleanup(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity);

    /// Advance the phase machine by `dt` seconds
    fn tick(&self, ctx: &mut DungeonCtx<'_>, spawner: Entity, dt: f32);

    /// Whether the runtime state still wants ticks (armed or winding down)
    fn is_running(&self, world: &World, spawner: Entity) -> bool;
}

/// Registry failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("spawnable '{0}' is already registered")]
    DuplicateId(String),
    #[error("spawnable id must not be empty")]
    EmptyId,
}

/// Maps execution ids to behaviors
#[derive(Default)]
pub struct SpawnableRegistry {
    behaviors: HashMap<String, Box<dyn Spawnable>>,
}

impl SpawnableRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in trap and monster
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: Vec<Box<dyn Spawnable>> = vec![
            Box::new(HydraulicPressTrap),
            Box::new(SawBladeTrap),
            Box::new(HammerTrap),
            Box::new(LaserTrap),
            Box::new(BeamTrap),
            Box::new(MonsterSpawner::archer()),
            Box::new(MonsterSpawner::brute()),
        ];
        for behavior in defaults {
            if let Err(e) = registry.register(behavior) {
                log::error!("Built-in spawnable rejected: {}", e);
            }
        }
        registry
    }

    /// Add a behavior. A second behavior with the same id is rejected.
    pub fn register(&mut self, behavior: Box<dyn Spawnable>) -> Result<(), RegistryError> {
        let id = behavior.id();
        if id.is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.behaviors.contains_key(id) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }
        log::debug!("Registered spawnable '{}'", id);
        self.behaviors.insert(id.to_string(), behavior);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<Box<dyn Spawnable>> {
        self.behaviors.remove(id)
    }

    /// Behavior for `id`. An empty id never resolves.
    pub fn get(&self, id: &str) -> Option<&dyn Spawnable> {
        if id.is_empty() {
            return None;
        }
        self.behaviors.get(id).map(|b| b.as_ref())
    }

    /// Like [`get`](Self::get) but logs the miss
    pub fn resolve(&self, id: &str) -> Option<&dyn Spawnable> {
        let found = self.get(id);
        if found.is_none() {
            if id.is_empty() {
                log::debug!("Spawner has no execution id configured");
            } else {
                log::warn!("No spawnable registered for execution id '{}'", id);
            }
        }
        found
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.behaviors.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.behaviors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    pub fn clear(&mut self) {
        self.behaviors.clear();
    }
}

/// Copy of a spawner's state component
pub(crate) fn load_state<T: hecs::Component + Clone>(world: &World, spawner: Entity) -> Option<T> {
    world.get::<&T>(spawner).ok().map(|state| (*state).clone())
}

/// Write a state component back, replacing the old one
pub(crate) fn store_state<T: hecs::Component>(world: &mut World, spawner: Entity, state: T) {
    if world.insert_one(spawner, state).is_err() {
        log::debug!("Spawner {:?} despawned before its state was stored", spawner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str);

    impl Spawnable for Noop {
        fn id(&self) -> &'static str {
            self.0
        }
        fn register(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {}
        fn activate(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {}
        fn deactivate(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {}
        fn cleanup(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity) {}
        fn tick(&self, _ctx: &mut DungeonCtx<'_>, _spawner: Entity, _dt: f32) {}
        fn is_running(&self, _world: &World, _spawner: Entity) -> bool {
            false
        }
    }

    #[test]
    fn test_duplicate_id_fails_fast() {
        let mut registry = SpawnableRegistry::new();
        registry.register(Box::new(Noop("spikes"))).unwrap();
        let err = registry.register(Box::new(Noop("spikes"))).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId("spikes".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_id_never_resolves() {
        let mut registry = SpawnableRegistry::new();
        assert_eq!(
            registry.register(Box::new(Noop(""))).unwrap_err(),
            RegistryError::EmptyId
        );
        assert!(registry.get("").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_unknown_id_is_a_miss_not_an_error() {
        let registry = SpawnableRegistry::with_defaults();
        assert!(registry.resolve("catapult").is_none());
        assert!(registry.get(PRESS_ID).is_some());
    }

    #[test]
    fn test_defaults_registered() {
        let registry = SpawnableRegistry::with_defaults();
        assert_eq!(
            registry.ids(),
            vec!["archer", "beam", "brute", "hammer", "hydraulic_press", "laser", "saw_blade"]
        );
    }

    #[test]
    fn test_unregister_and_clear() {
        let mut registry = SpawnableRegistry::with_defaults();
        assert!(registry.unregister(LASER_ID).is_some());
        assert!(!registry.is_registered(LASER_ID));
        registry.clear();
        assert!(registry.is_empty());
    }
}
