//! System-wide cognitive failure gate.
//!
//! Counts consecutive cognitive failures across all providers. Below the
//! threshold a failed cycle is retried after an exponential delay; at the
//! threshold the coordinator hands control to the survival machine.

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use cognis_core::durations::humane;

/// Failure gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureGateConfig {
    /// Consecutive cognitive failures before survival mode
    pub threshold: u32,

    /// Delay before the first retry
    #[serde(with = "humane")]
    pub backoff_min: Duration,

    /// Upper bound on any retry delay
    #[serde(with = "humane")]
    pub backoff_max: Duration,

    /// Growth factor between retries
    pub backoff_factor: f32,
}

impl Default for FailureGateConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

/// What the caller should do after a cognitive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// Retry after `delay`; this was failure number `attempt`
    Retry { attempt: u32, delay: Duration },

    /// Threshold reached
    Tripped { failures: u32 },
}

/// Consecutive cognitive failure counter.
#[derive(Debug)]
pub struct CognitiveFailureGate {
    failures: AtomicU32,
    config: FailureGateConfig,
}

impl CognitiveFailureGate {
    /// Create a new gate.
    pub fn new(config: FailureGateConfig) -> Self {
        Self {
            failures: AtomicU32::new(0),
            config,
        }
    }

    /// Record one cognitive failure.
    pub fn record_failure(&self) -> GateVerdict {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;

        if failures >= self.config.threshold {
            tracing::warn!(
                failures,
                threshold = self.config.threshold,
                "Cognitive failure threshold reached"
            );
            GateVerdict::Tripped { failures }
        } else {
            let delay = self.delay_for(failures);
            tracing::warn!(
                failures,
                threshold = self.config.threshold,
                delay = ?delay,
                "Cognitive failure, retry scheduled"
            );
            GateVerdict::Retry {
                attempt: failures,
                delay,
            }
        }
    }

    /// Clear the counter after reasoning succeeds again.
    pub fn reset(&self) {
        let previous = self.failures.swap(0, Ordering::SeqCst);
        if previous > 0 {
            tracing::info!(previous, "Cognitive failure counter reset");
        }
    }

    /// Current consecutive failure count.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &FailureGateConfig {
        &self.config
    }

    /// Retry delay after `attempt` consecutive failures (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1) as usize;
        ExponentialBuilder::default()
            .with_min_delay(self.config.backoff_min)
            .with_max_delay(self.config.backoff_max)
            .with_factor(self.config.backoff_factor)
            .with_max_times(attempt)
            .build()
            .nth(attempt - 1)
            .unwrap_or(self.config.backoff_max)
    }
}

impl Default for CognitiveFailureGate {
    fn default() -> Self {
        Self::new(FailureGateConfig::default())
    }
}
