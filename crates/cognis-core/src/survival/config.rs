//! Survival machine thresholds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::durations::humane;

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

/// Thresholds and cadences for degraded mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalConfig {
    /// Every Nth cycle probes for a usable provider
    pub probe_every_cycles: u32,

    /// Time in degraded mode after which the agent dies
    #[serde(with = "humane")]
    pub starvation_timeout: Duration,

    /// Gas balance below which on-chain action is impossible
    pub gas_critical_floor: f64,

    /// Runway (days) below which the agent prepares for death
    pub terminal_runway_days: f64,

    /// Runway (days) below which the agent conserves resources
    pub conservation_runway_days: f64,

    /// Probe delay when resting on an empty gas balance
    #[serde(with = "humane")]
    pub gas_rest_probe_delay: Duration,

    /// Heartbeat interval while conserving resources
    #[serde(with = "humane")]
    pub conservation_heartbeat: Duration,

    /// Heartbeat interval while resting
    #[serde(with = "humane")]
    pub rest_heartbeat: Duration,

    /// Fraction of the timeout after which a death time is projected
    pub death_warning_fraction: f64,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            probe_every_cycles: 3,
            starvation_timeout: Duration::from_secs(72 * HOUR),
            gas_critical_floor: 0.0002,
            terminal_runway_days: 2.0,
            conservation_runway_days: 7.0,
            gas_rest_probe_delay: Duration::from_secs(48 * HOUR),
            conservation_heartbeat: Duration::from_secs(7 * DAY),
            rest_heartbeat: Duration::from_secs(DAY),
            death_warning_fraction: 0.8,
        }
    }
}

impl SurvivalConfig {
    /// `death_warning_fraction` clamped to [0, 1]; non-finite values
    /// disable the early projection.
    pub fn warning_fraction(&self) -> f64 {
        if self.death_warning_fraction.is_finite() {
            self.death_warning_fraction.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}
