//! Reasoning provider records and the registry that holds them.

mod registry;
mod roster;

pub use registry::{ProviderRegistry, RegistryError, CIRCUIT_TRIP_FAILURES};
pub use roster::{Roster, RosterError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a provider is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderProtocol {
    Free,
    MeteredPayment,
    ApiKey,
}

impl fmt::Display for ProviderProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderProtocol::Free => "free",
            ProviderProtocol::MeteredPayment => "metered-payment",
            ProviderProtocol::ApiKey => "api-key",
        };
        f.write_str(s)
    }
}

/// A reasoning backend with its economic terms and reputation.
///
/// Reputation fields are only mutated by the reputation tracker and by
/// health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Stable identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Network endpoint
    pub endpoint: String,

    /// Payment protocol
    pub protocol: ProviderProtocol,

    /// Price per 1000 tokens
    #[serde(default)]
    pub cost_per_1k_tokens: f64,

    /// Balance that must remain after paying for a call
    #[serde(default)]
    pub min_balance_required: f64,

    /// Observed response quality (0.0 - 1.0)
    #[serde(default = "default_score")]
    pub quality_score: f64,

    /// Rolling success rate (0.0 - 1.0)
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,

    /// Rolling average latency in milliseconds
    #[serde(default = "default_latency")]
    pub avg_latency_ms: f64,

    /// Whether the provider may be selected
    #[serde(default = "default_available")]
    pub available: bool,

    /// Failures since the last success
    #[serde(default)]
    pub consecutive_failures: u32,

    /// Last health check
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
}

fn default_score() -> f64 {
    0.5
}

fn default_success_rate() -> f64 {
    1.0
}

fn default_latency() -> f64 {
    1000.0
}

fn default_available() -> bool {
    true
}

impl ProviderRecord {
    /// Create a free provider with neutral reputation.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        protocol: ProviderProtocol,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            protocol,
            cost_per_1k_tokens: 0.0,
            min_balance_required: 0.0,
            quality_score: default_score(),
            success_rate: default_success_rate(),
            avg_latency_ms: default_latency(),
            available: true,
            consecutive_failures: 0,
            last_checked_at: None,
        }
    }

    /// Set the economic terms.
    pub fn with_pricing(mut self, cost_per_1k_tokens: f64, min_balance_required: f64) -> Self {
        self.cost_per_1k_tokens = cost_per_1k_tokens;
        self.min_balance_required = min_balance_required;
        self
    }

    /// Set the starting quality and success rate.
    pub fn with_reputation(mut self, quality_score: f64, success_rate: f64) -> Self {
        self.quality_score = quality_score;
        self.success_rate = success_rate;
        self
    }

    /// Set the starting average latency.
    pub fn with_latency(mut self, avg_latency_ms: f64) -> Self {
        self.avg_latency_ms = avg_latency_ms;
        self
    }

    /// True when calls cost nothing.
    pub fn is_free(&self) -> bool {
        self.cost_per_1k_tokens == 0.0
    }

    /// Estimated cost of a call consuming `tokens` tokens.
    pub fn estimate_cost(&self, tokens: u32) -> f64 {
        self.cost_per_1k_tokens * tokens as f64 / 1000.0
    }

    /// True when the provider passes the availability filter.
    pub fn is_selectable(&self) -> bool {
        self.available && self.consecutive_failures < CIRCUIT_TRIP_FAILURES
    }
}
