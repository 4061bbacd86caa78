//! Reputation learning for providers.
//!
//! Every call outcome nudges a provider's success rate, latency and
//! quality with an exponential moving average. Three consecutive failures
//! take the provider out of rotation until a health check brings it back.

use serde::{Deserialize, Serialize};

use crate::provider::{ProviderRegistry, RegistryError, CIRCUIT_TRIP_FAILURES};
use crate::types::clamp_unit;

/// Smoothing factor for all reputation signals.
pub const REPUTATION_ALPHA: f64 = 0.1;

/// Observed result of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Whether the call produced usable reasoning
    pub success: bool,

    /// Elapsed time, if measured
    pub latency_ms: Option<f64>,

    /// Scored response quality (0.0 - 1.0), if assessed
    pub quality_score: Option<f64>,
}

impl CallOutcome {
    /// A successful call.
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// A failed call.
    pub fn failure() -> Self {
        Self::default()
    }

    /// Attach measured latency.
    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Attach a quality score.
    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = Some(quality_score);
        self
    }
}

/// Provider state after an outcome was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationUpdate {
    pub provider_id: String,
    pub success_rate: f64,
    pub consecutive_failures: u32,
    pub available: bool,

    /// True when this outcome took the provider out of rotation
    pub tripped: bool,
}

/// Applies call outcomes to provider records.
#[derive(Debug, Clone, Copy)]
pub struct ReputationTracker {
    alpha: f64,
}

impl Default for ReputationTracker {
    fn default() -> Self {
        Self::new(REPUTATION_ALPHA)
    }
}

impl ReputationTracker {
    /// Create a tracker with a custom smoothing factor.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: clamp_unit(alpha),
        }
    }

    /// Apply a call outcome to a registered provider.
    pub fn record_outcome(
        &self,
        registry: &mut ProviderRegistry,
        provider_id: &str,
        outcome: CallOutcome,
    ) -> Result<ReputationUpdate, RegistryError> {
        let alpha = self.alpha;
        let provider = registry.get_mut(provider_id)?;
        let mut tripped = false;

        if outcome.success {
            provider.success_rate = provider.success_rate * (1.0 - alpha) + alpha;
            if let Some(latency) = outcome.latency_ms {
                provider.avg_latency_ms = ema(provider.avg_latency_ms, latency.max(0.0), alpha);
            }
            if let Some(quality) = outcome.quality_score {
                provider.quality_score = ema(provider.quality_score, clamp_unit(quality), alpha);
            }
            provider.consecutive_failures = 0;
        } else {
            provider.success_rate *= 1.0 - alpha;
            provider.consecutive_failures += 1;

            if provider.consecutive_failures == CIRCUIT_TRIP_FAILURES {
                provider.available = false;
                tripped = true;
                tracing::warn!(
                    provider = %provider_id,
                    failures = provider.consecutive_failures,
                    success_rate = provider.success_rate,
                    "Provider circuit tripped after repeated failures"
                );
            }
        }

        Ok(ReputationUpdate {
            provider_id: provider.id.clone(),
            success_rate: provider.success_rate,
            consecutive_failures: provider.consecutive_failures,
            available: provider.available,
            tripped,
        })
    }
}

fn ema(current: f64, sample: f64, alpha: f64) -> f64 {
    current * (1.0 - alpha) + sample * alpha
}
