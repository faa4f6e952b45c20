//! Per-spawner runtime state for each trap archetype.
//!
//! Every state owns its phase, phase timer and tuning values. Changing a
//! phase always restarts the phase timer.

use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Hydraulic press phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressPhase {
    Idle,
    Pressing,
    Retracting,
    Cooldown,
}

/// Hydraulic press state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressState {
    pub phase: PressPhase,
    pub phase_timer: f32,
    pub active: bool,
    pub pending_deactivation: bool,
    pub has_damaged_this_cycle: bool,
    /// Rest period drawn when the current cooldown started
    pub current_cooldown: f32,

    pub press_duration: f32,
    pub retract_duration: f32,
    pub cooldown_min: f32,
    pub cooldown_max: f32,
    pub damage: f32,
    /// Seconds into the press at which damage lands
    pub damage_delay: f32,
    pub damage_radius: f32,
    pub knockback_y: f32,
    pub knockback_horizontal: f32,
    pub velocity_multiplier: f32,

    #[serde(skip)]
    pub spawned: Option<Entity>,
}

impl Default for PressState {
    fn default() -> Self {
        Self {
            phase: PressPhase::Idle,
            phase_timer: 0.0,
            active: false,
            pending_deactivation: false,
            has_damaged_this_cycle: false,
            current_cooldown: 0.0,
            press_duration: 3.0495,
            retract_duration: 3.0,
            cooldown_min: 0.0,
            cooldown_max: 2.0,
            damage: 25.0,
            damage_delay: 0.2033,
            damage_radius: 2.0,
            knockback_y: 1.3,
            knockback_horizontal: 1.3,
            velocity_multiplier: 1.0,
            spawned: None,
        }
    }
}

impl PressState {
    pub fn set_phase(&mut self, phase: PressPhase) {
        self.phase = phase;
        self.phase_timer = 0.0;
    }

    /// Back to a fresh idle cycle, tuning kept
    pub fn reset(&mut self) {
        self.set_phase(PressPhase::Idle);
        self.pending_deactivation = false;
        self.has_damaged_this_cycle = false;
        self.current_cooldown = 0.0;
    }
}

/// Saw blade phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SawBladePhase {
    Hidden,
    Entering,
    Active,
    Peeking,
    Exiting,
}

/// Horizontal axis a trap is aligned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapAxis {
    X,
    Z,
}

/// Saw blade state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SawBladeState {
    pub phase: SawBladePhase,
    pub phase_timer: f32,
    pub active: bool,
    pub pending_deactivation: bool,
    /// Time since the last damage tick
    pub last_damage_time: f32,

    pub damage: f32,
    pub damage_tick_interval: f32,
    pub damage_radius: f32,
    pub movement_axis: TrapAxis,
    pub enter_duration: f32,
    pub exit_duration: f32,
    pub active_duration: f32,
    pub peek_duration: f32,

    #[serde(skip)]
    pub spawned: Option<Entity>,
}

impl Default for SawBladeState {
    fn default() -> Self {
        Self {
            phase: SawBladePhase::Hidden,
            phase_timer: 0.0,
            active: false,
            pending_deactivation: false,
            last_damage_time: 0.0,
            damage: 25.0,
            damage_tick_interval: 0.5,
            damage_radius: 0.5,
            movement_axis: TrapAxis::Z,
            enter_duration: 1.0,
            exit_duration: 1.0,
            active_duration: 10.13,
            peek_duration: 2.5,
            spawned: None,
        }
    }
}

impl SawBladeState {
    pub fn set_phase(&mut self, phase: SawBladePhase) {
        self.phase = phase;
        self.phase_timer = 0.0;
    }

    pub fn reset(&mut self) {
        self.set_phase(SawBladePhase::Hidden);
        self.pending_deactivation = false;
        self.last_damage_time = 0.0;
    }
}

/// Hammer phases. A cycle swings left then right, each pushing the opposite way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HammerPhase {
    Idle,
    SwingLeft,
    SwingRight,
}

impl HammerPhase {
    /// Sign of the horizontal knockback while swinging
    pub fn knockback_sign(&self) -> f32 {
        match self {
            HammerPhase::Idle => 0.0,
            HammerPhase::SwingLeft => 1.0,
            HammerPhase::SwingRight => -1.0,
        }
    }
}

/// Hammer state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HammerState {
    pub phase: HammerPhase,
    pub phase_timer: f32,
    pub active: bool,
    pub pending_deactivation: bool,
    pub has_damaged_this_swing: bool,

    pub damage: f32,
    pub damage_delay: f32,
    pub swing_duration: f32,
    /// Zone extent along the knockback axis
    pub damage_zone_width: f32,
    pub damage_zone_height: f32,
    /// Zone extent across the knockback axis
    pub damage_zone_depth: f32,
    pub damage_zone_offset_y: f32,
    pub knockback_y: f32,
    pub knockback_horizontal: f32,
    pub knockback_axis: TrapAxis,

    #[serde(skip)]
    pub spawned: Option<Entity>,
}

impl Default for HammerState {
    fn default() -> Self {
        Self {
            phase: HammerPhase::Idle,
            phase_timer: 0.0,
            active: false,
            pending_deactivation: false,
            has_damaged_this_swing: false,
            damage: 75.0,
            damage_delay: 0.45,
            swing_duration: 1.0,
            damage_zone_width: 6.0,
            damage_zone_height: 3.0,
            damage_zone_depth: 2.0,
            damage_zone_offset_y: 0.0,
            knockback_y: 5.0,
            knockback_horizontal: 8.0,
            knockback_axis: TrapAxis::X,
            spawned: None,
        }
    }
}

impl HammerState {
    pub fn set_phase(&mut self, phase: HammerPhase) {
        self.phase = phase;
        self.phase_timer = 0.0;
        self.has_damaged_this_swing = false;
    }

    pub fn reset(&mut self) {
        self.set_phase(HammerPhase::Idle);
        self.pending_deactivation = false;
    }
}

/// Shared state of the projectile laser and the continuous beam
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserState {
    pub active: bool,
    pub fire_timer: f32,
    pub fire_interval: f32,
    pub damage: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_z: f32,
    /// Degrees
    pub yaw: f32,
    /// Degrees, 90 shoots straight up
    pub pitch: f32,
    pub projectile_id: String,
}

impl Default for LaserState {
    fn default() -> Self {
        Self::with_interval(2.0)
    }
}

impl LaserState {
    pub fn with_interval(fire_interval: f32) -> Self {
        Self {
            active: false,
            fire_timer: 0.0,
            fire_interval,
            damage: 45.0,
            offset_x: 0.0,
            offset_y: 0.5,
            offset_z: 0.0,
            yaw: 0.0,
            pitch: 90.0,
            projectile_id: "Laser_Projectile".to_string(),
        }
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.fire_timer = 0.0;
    }
}

/// Monster spawner state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonsterState {
    pub active: bool,
    #[serde(skip)]
    pub spawned: Option<Entity>,
}

impl MonsterState {
    pub fn has_spawned(&self) -> bool {
        self.spawned.is_some()
    }

    pub fn reset(&mut self) {
        self.active = false;
    }
}
