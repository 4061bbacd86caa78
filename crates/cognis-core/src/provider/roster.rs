//! Provider roster parsing from YAML/JSON.
//!
//! A roster bundles the agent's traits with the providers it starts with.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::{ProviderRecord, ProviderRegistry};
use crate::types::CognitiveTraits;

/// Errors that can occur when loading a roster.
#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Failed to read roster file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Roster validation failed: {0}")]
    ValidationError(String),

    #[error("Duplicate provider ID: {0}")]
    DuplicateProvider(String),
}

/// Starting traits and providers for an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    /// Personality traits
    #[serde(default)]
    pub traits: CognitiveTraits,

    /// Providers to register
    #[serde(default)]
    pub providers: Vec<ProviderRecord>,
}

impl Roster {
    /// Parse a roster from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RosterError> {
        let roster: Roster = serde_yaml::from_str(yaml)?;
        roster.validate()?;
        Ok(roster)
    }

    /// Parse a roster from JSON string.
    pub fn from_json(json: &str) -> Result<Self, RosterError> {
        let roster: Roster = serde_json::from_str(json)?;
        roster.validate()?;
        Ok(roster)
    }

    /// Parse a roster file, choosing the format by extension.
    ///
    /// `.json` is parsed as JSON; anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Build a registry holding every roster provider.
    pub fn registry(&self) -> ProviderRegistry {
        self.providers.iter().cloned().collect()
    }

    fn validate(&self) -> Result<(), RosterError> {
        let mut seen = std::collections::HashSet::new();

        for provider in &self.providers {
            if provider.id.is_empty() {
                return Err(RosterError::ValidationError(
                    "provider id must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(RosterError::DuplicateProvider(provider.id.clone()));
            }
            check_unit(&provider.id, "quality_score", provider.quality_score)?;
            check_unit(&provider.id, "success_rate", provider.success_rate)?;
            check_non_negative(&provider.id, "cost_per_1k_tokens", provider.cost_per_1k_tokens)?;
            check_non_negative(&provider.id, "min_balance_required", provider.min_balance_required)?;
            check_non_negative(&provider.id, "avg_latency_ms", provider.avg_latency_ms)?;
        }

        check_unit("traits", "risk_appetite", self.traits.risk_appetite)?;
        check_unit("traits", "savings_tendency", self.traits.savings_tendency)?;
        check_unit("traits", "cognition_quality", self.traits.cognition_quality)?;
        check_unit("traits", "cooperation_tendency", self.traits.cooperation_tendency)?;

        Ok(())
    }
}

fn check_unit(owner: &str, field: &str, value: f64) -> Result<(), RosterError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RosterError::ValidationError(format!(
            "{owner}.{field} must be within [0, 1], got {value}"
        )))
    }
}

fn check_non_negative(owner: &str, field: &str, value: f64) -> Result<(), RosterError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(RosterError::ValidationError(format!(
            "{owner}.{field} must not be negative, got {value}"
        )))
    }
}
