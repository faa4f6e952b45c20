//! Common components used across multiple entity types.

use serde::{Deserialize, Serialize};

/// 3D position vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Squared distance ignoring the vertical axis
    pub fn horizontal_distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Unit direction for a pitch/yaw pair in degrees.
    ///
    /// Pitch 90 points straight up, yaw 0 with pitch 0 points down -Z.
    pub fn from_pitch_yaw(pitch_deg: f32, yaw_deg: f32) -> Self {
        let pitch = pitch_deg.to_radians();
        let yaw = yaw_deg.to_radians();
        Self {
            x: -yaw.sin() * pitch.cos(),
            y: pitch.sin(),
            z: -yaw.cos() * pitch.cos(),
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Distance along the ray at which it first enters the box, if it hits at all.
    ///
    /// `direction` does not need to be normalized, the result is in units of it.
    pub fn ray_entry(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        let axes = [
            (origin.x, direction.x, self.min.x, self.max.x),
            (origin.y, direction.y, self.min.y, self.max.y),
            (origin.z, direction.z, self.min.z, self.max.z),
        ];
        for (o, d, lo, hi) in axes {
            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (t0, t1) = {
                let a = (lo - o) * inv;
                let b = (hi - o) * inv;
                if a < b { (a, b) } else { (b, a) }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }
        Some(t_min.max(0.0))
    }
}

/// World-space position of an entity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position(pub Vec3);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

/// Current velocity, written by knockback
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

/// Collision extents relative to the entity position (feet at `position.y`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Hitbox {
    pub half_width: f32,
    pub height: f32,
}

impl Default for Hitbox {
    fn default() -> Self {
        Self {
            half_width: 0.3,
            height: 1.8,
        }
    }
}

impl Hitbox {
    /// World-space box for an entity standing at `position`
    pub fn at(&self, position: Vec3) -> BoundingBox {
        BoundingBox::new(
            Vec3::new(
                position.x - self.half_width,
                position.y,
                position.z - self.half_width,
            ),
            Vec3::new(
                position.x + self.half_width,
                position.y + self.height,
                position.z + self.half_width,
            ),
        )
    }
}

/// Hit points of anything traps can hurt
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    pub fn restore(&mut self) {
        self.current = self.max;
    }
}

/// A connected player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Marker: the player died and has not been handled yet
#[derive(Debug, Clone, Copy, Default)]
pub struct Dead;

/// Saved respawn locations of a player
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RespawnPoints(pub Vec<Vec3>);
