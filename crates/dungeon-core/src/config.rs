//! Tuning for discovery, merging and the per-tick systems.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to load a [`DungeonConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid dungeon config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid dungeon config: {0}")]
    Invalid(String),
}

/// Radii and timings used by the dungeon engine.
///
/// Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonConfig {
    /// Flood-fill radius for spawner discovery
    pub registration_radius: f32,
    /// Half-size of the cube scanned for dungeon blocks at registration
    pub block_scan_radius: f32,
    /// Flood-fill radius when looking for the network's entrance
    pub entrance_search_radius: f32,
    /// Radius searched for neighboring networks before registering
    pub merge_radius: f32,
    /// Two networks closer than this (squared) are the same placement pasted twice
    pub duplicate_distance_sq: f32,
    /// Trigger radius given to networks created by `assign_network`
    pub default_trigger_radius: f32,
    /// Spawners only tick while a dungeoneer is this close
    pub spawner_tick_radius: f32,
    /// Default radius for nearest-network lookups
    pub nearest_search_radius: f32,
    /// Seconds between the first claim and activation
    pub activation_delay: f32,
}

impl Default for DungeonConfig {
    fn default() -> Self {
        Self {
            registration_radius: 200.0,
            block_scan_radius: 200.0,
            entrance_search_radius: 300.0,
            merge_radius: 50.0,
            duplicate_distance_sq: 1.0,
            default_trigger_radius: 10.0,
            spawner_tick_radius: 50.0,
            nearest_search_radius: 500.0,
            activation_delay: 1.0,
        }
    }
}

impl DungeonConfig {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DungeonConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let radii = [
            ("registration_radius", self.registration_radius),
            ("block_scan_radius", self.block_scan_radius),
            ("entrance_search_radius", self.entrance_search_radius),
            ("merge_radius", self.merge_radius),
            ("default_trigger_radius", self.default_trigger_radius),
            ("spawner_tick_radius", self.spawner_tick_radius),
            ("nearest_search_radius", self.nearest_search_radius),
        ];
        for (name, value) in radii {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.duplicate_distance_sq < 0.0 {
            return Err(ConfigError::Invalid(
                "duplicate_distance_sq must not be negative".into(),
            ));
        }
        if self.activation_delay < 0.0 {
            return Err(ConfigError::Invalid(
                "activation_delay must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DungeonConfig::from_json(r#"{ "merge_radius": 75.0 }"#).unwrap();
        assert_eq!(config.merge_radius, 75.0);
        assert_eq!(config.registration_radius, 200.0);
        assert_eq!(config.duplicate_distance_sq, 1.0);
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let err = DungeonConfig::from_json(r#"{ "registration_radius": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = DungeonConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_json_roundtrip_preserves_values() {
        let config = DungeonConfig {
            activation_delay: 2.5,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(DungeonConfig::from_json(&json).unwrap(), config);
    }
}
