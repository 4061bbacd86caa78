//! In-memory provider registry.
//!
//! Providers are kept in a `BTreeMap` so iteration order (and therefore
//! selection tie-breaking) is deterministic.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use super::ProviderRecord;

/// Consecutive failures at which a provider is taken out of rotation.
pub const CIRCUIT_TRIP_FAILURES: u32 = 3;

/// Errors from registry lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

/// Registry of reasoning providers owned by one agent.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderRecord>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any record with the same id.
    ///
    /// Returns the replaced record, if any.
    pub fn register(&mut self, mut provider: ProviderRecord) -> Option<ProviderRecord> {
        if provider.consecutive_failures >= CIRCUIT_TRIP_FAILURES {
            provider.available = false;
        }
        tracing::debug!(provider = %provider.id, protocol = %provider.protocol, "Registering provider");
        self.providers.insert(provider.id.clone(), provider)
    }

    /// Remove a provider. Returns `true` if it was registered.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.providers.remove(id).is_some()
    }

    /// Look up a provider.
    pub fn get(&self, id: &str) -> Option<&ProviderRecord> {
        self.providers.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut ProviderRecord, RegistryError> {
        self.providers
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownProvider(id.to_string()))
    }

    /// Snapshot of every provider that may currently be selected.
    ///
    /// Never mutates state.
    pub fn list_available(&self) -> Vec<ProviderRecord> {
        self.providers
            .values()
            .filter(|p| p.is_selectable())
            .cloned()
            .collect()
    }

    /// Every registered provider, selectable or not.
    pub fn all(&self) -> impl Iterator<Item = &ProviderRecord> {
        self.providers.values()
    }

    /// Providers currently out of rotation.
    pub fn unavailable_ids(&self) -> Vec<String> {
        self.providers
            .values()
            .filter(|p| !p.is_selectable())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Apply the result of a health probe.
    ///
    /// This is the only way a tripped provider returns to rotation.
    pub fn record_health_check(
        &mut self,
        id: &str,
        healthy: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let provider = self.get_mut(id)?;
        provider.last_checked_at = Some(now);
        if healthy {
            if !provider.available {
                tracing::info!(provider = %id, "Provider re-enabled after health check");
            }
            provider.available = true;
            provider.consecutive_failures = 0;
        } else {
            provider.available = false;
        }
        Ok(())
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl FromIterator<ProviderRecord> for ProviderRegistry {
    fn from_iter<T: IntoIterator<Item = ProviderRecord>>(iter: T) -> Self {
        let mut registry = Self::new();
        for provider in iter {
            registry.register(provider);
        }
        registry
    }
}
