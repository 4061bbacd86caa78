//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use cognis_core::durations::humane;
use cognis_core::SurvivalConfig;

use crate::balance::DEFAULT_BALANCE_TTL;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::resilience::FailureGateConfig;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Configuration for the decision coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long a fetched balance is served without refresh
    #[serde(with = "humane")]
    pub balance_ttl: Duration,

    /// Routing decisions retained for dashboards
    pub history_capacity: usize,

    /// Deadline for a single backend call
    #[serde(with = "humane")]
    pub call_timeout: Duration,

    /// Token estimate used when a request carries none
    pub default_estimated_tokens: u32,

    /// System-wide cognitive failure handling
    pub failure_gate: FailureGateConfig,

    /// Degraded-mode thresholds
    pub survival: SurvivalConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            balance_ttl: DEFAULT_BALANCE_TTL,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            call_timeout: Duration::from_secs(30),
            default_estimated_tokens: 1000,
            failure_gate: FailureGateConfig::default(),
            survival: SurvivalConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_gate.threshold == 0 {
            return Err(ConfigError::ValidationError(
                "failure_gate.threshold must be at least 1".to_string(),
            ));
        }
        if self.failure_gate.backoff_min > self.failure_gate.backoff_max {
            return Err(ConfigError::ValidationError(
                "failure_gate.backoff_min must not exceed backoff_max".to_string(),
            ));
        }
        let factor = self.failure_gate.backoff_factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "failure_gate.backoff_factor must be a finite value of at least 1, got {factor}"
            )));
        }
        let fraction = self.survival.death_warning_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::ValidationError(format!(
                "survival.death_warning_fraction must be within [0, 1], got {fraction}"
            )));
        }
        if self.survival.probe_every_cycles == 0 {
            return Err(ConfigError::ValidationError(
                "survival.probe_every_cycles must be at least 1".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "call_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
