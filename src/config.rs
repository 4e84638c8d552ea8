//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. The core never reads this directly; callers pass the values
//! down as plain parameters.

use std::path::Path;

use crate::curve::{DEFAULT_RADIUS, DEFAULT_SECTOR_COUNT, MIN_SECTOR_COUNT};

/// Parameter steps per patch when sweeping a tube.
pub const DEFAULT_TICK_COUNT: u32 = 500;
/// Picks farther than this from the ray select nothing.
pub const DEFAULT_MAX_PICK_DISTANCE: f32 = 0.5;
/// Parameter step for sampled distance and length queries.
pub const DEFAULT_SAMPLE_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TubeSettings {
    pub tick_count: u32,
    pub default_radius: f32,
    pub default_sector_count: u32,
}

impl Default for TubeSettings {
    fn default() -> Self {
        Self {
            tick_count: DEFAULT_TICK_COUNT,
            default_radius: DEFAULT_RADIUS,
            default_sector_count: DEFAULT_SECTOR_COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PickSettings {
    pub max_distance: f32,
    pub epsilon: f32,
}

impl Default for PickSettings {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_PICK_DISTANCE,
            epsilon: DEFAULT_SAMPLE_EPSILON,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tube: TubeSettings,
    pub picking: PickSettings,
    pub length_epsilon: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tube: TubeSettings::default(),
            picking: PickSettings::default(),
            length_epsilon: DEFAULT_SAMPLE_EPSILON,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be positive and finite, got {}",
            name, value
        )))
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tube.tick_count == 0 {
            return Err(ConfigError::Invalid("tube.tick_count must be non-zero".into()));
        }
        if self.tube.default_sector_count < MIN_SECTOR_COUNT {
            return Err(ConfigError::Invalid(format!(
                "tube.default_sector_count must be at least {}, got {}",
                MIN_SECTOR_COUNT, self.tube.default_sector_count
            )));
        }
        positive("tube.default_radius", self.tube.default_radius)?;
        positive("picking.max_distance", self.picking.max_distance)?;
        positive("picking.epsilon", self.picking.epsilon)?;
        positive("length_epsilon", self.length_epsilon)?;
        Ok(())
    }
}

pub fn load_config_from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tube.tick_count, 500);
        assert_eq!(config.tube.default_radius, 0.25);
        assert_eq!(config.tube.default_sector_count, 128);
        assert_eq!(config.picking.max_distance, 0.5);
        assert_eq!(config.picking.epsilon, 0.01);
        assert_eq!(config.length_epsilon, 0.01);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"tube": {"tick_count": 64}, "picking": {"max_distance": 2.0}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tube.tick_count, 64);
        assert_eq!(config.tube.default_sector_count, 128);
        assert_eq!(config.picking.max_distance, 2.0);
        assert_eq!(config.picking.epsilon, 0.01);
        assert_eq!(config.length_epsilon, 0.01);

        let empty: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, EngineConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.tube.default_sector_count = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.tube.tick_count = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.picking.epsilon = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("curvecraft_config_{}_{}.json", std::process::id(), nonce));

        std::fs::write(&path, r#"{"tube": {"default_radius": 0.5}}"#).unwrap();
        let config = load_config_from_file(&path).unwrap();
        assert_eq!(config.tube.default_radius, 0.5);

        std::fs::write(&path, r#"{"tube": {"default_radius": -0.5}}"#).unwrap();
        assert!(matches!(
            load_config_from_file(&path),
            Err(ConfigError::Invalid(_))
        ));

        let _ = std::fs::remove_file(&path);
        assert!(matches!(load_config_from_file(&path), Err(ConfigError::Io(_))));
    }
}
