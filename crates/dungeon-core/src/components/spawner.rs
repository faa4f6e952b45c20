//! Spawner components and the entities traps create.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::Vec3;

/// Marks an entity as a trap or monster source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spawner {
    /// Selects the behavior in the registry. Empty means unconfigured.
    pub execution_id: String,
    #[serde(skip)]
    pub active: bool,
}

impl Spawner {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            active: false,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.execution_id.is_empty()
    }
}

/// Tags every entity a behavior created, so it can be swept later
#[derive(Debug, Clone, Copy)]
pub struct SpawnedEntity {
    pub spawner: Entity,
}

/// Visual/physical body of a trap (press head, saw blade, hammer)
#[derive(Debug, Clone)]
pub struct TrapModel {
    pub model: String,
}

/// A projectile in flight
#[derive(Debug, Clone)]
pub struct Projectile {
    pub asset_id: String,
    pub direction: Vec3,
}

/// A monster spawned by a monster spawner
#[derive(Debug, Clone)]
pub struct Npc {
    pub role: String,
}

/// Animation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationSlot {
    Movement,
    Action,
}

/// A clip playing on one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationClip {
    pub name: String,
    pub looping: bool,
}

/// Clips currently playing on an entity
#[derive(Debug, Clone, Default)]
pub struct PlayingAnimation {
    pub movement: Option<AnimationClip>,
    pub action: Option<AnimationClip>,
}

impl PlayingAnimation {
    pub fn slot(&self, slot: AnimationSlot) -> Option<&AnimationClip> {
        match slot {
            AnimationSlot::Movement => self.movement.as_ref(),
            AnimationSlot::Action => self.action.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: AnimationSlot) -> &mut Option<AnimationClip> {
        match slot {
            AnimationSlot::Movement => &mut self.movement,
            AnimationSlot::Action => &mut self.action,
        }
    }

    /// Name of the clip on `slot`, if any
    pub fn clip_name(&self, slot: AnimationSlot) -> Option<&str> {
        self.slot(slot).map(|c| c.name.as_str())
    }
}
