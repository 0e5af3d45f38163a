//! Tick loop configuration.
//!
//! Loaded from an optional JSON file; any field left out keeps its default.
//! Command-line flags override the file in `main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading a [`TickConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for a [`TickConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The tick rate is zero, negative, or not finite.
    #[error("tick rate must be a positive number, got {0}")]
    InvalidTickRate(f64),
}

/// Configuration for the tick loop and the demo world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Number of moving entities the demo spawns.
    pub entities: usize,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            entities: 8,
        }
    }
}

impl TickConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidTickRate`] for an unusable tick rate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// errors of [`TickConfig::from_json`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Checks that the values can drive a tick loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTickRate`] unless the tick rate is
    /// finite and positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate.is_finite() && self.tick_rate > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidTickRate(self.tick_rate))
        }
    }

    /// Wall-clock budget of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TickConfig::default();
        assert!((config.tick_rate - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.max_ticks, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TickConfig::from_json(r#"{ "max_ticks": 10 }"#).unwrap();
        assert_eq!(config.max_ticks, 10);
        assert_eq!(config.entities, TickConfig::default().entities);
    }

    #[test]
    fn test_invalid_tick_rate_rejected() {
        let err = TickConfig::from_json(r#"{ "tick_rate": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTickRate(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = TickConfig::from_json("{ tick_rate: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = TickConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = TickConfig {
            tick_rate: 30.0,
            max_ticks: 100,
            entities: 3,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(TickConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_tick_duration() {
        let config = TickConfig {
            tick_rate: 4.0,
            ..TickConfig::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_millis(250));
    }
}
