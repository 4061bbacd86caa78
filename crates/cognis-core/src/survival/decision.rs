//! Typed survival decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::durations::humane_option;

/// What the agent should do this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurvivalAction {
    /// A provider is usable again; leave degraded mode
    ResumeCognition,

    /// Degraded mode lasted too long; terminate
    Die,

    /// Idle until the next heartbeat
    Rest,

    /// Put affairs in order before death
    FinalizeLegacy,

    /// Cut every non-essential expense
    ResourceConservation,
}

impl fmt::Display for SurvivalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SurvivalAction::ResumeCognition => "RESUME_COGNITION",
            SurvivalAction::Die => "DIE",
            SurvivalAction::Rest => "REST",
            SurvivalAction::FinalizeLegacy => "FINALIZE_LEGACY",
            SurvivalAction::ResourceConservation => "RESOURCE_CONSERVATION",
        };
        f.write_str(s)
    }
}

/// Why a decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurvivalReason {
    /// Gas balance cannot pay for on-chain action
    EthCritical,

    /// Less than the terminal runway remains
    RunwayTerminal,

    /// Less than the conservation runway remains
    RunwayLow,

    /// No reasoning is reachable
    CognitiveStarvation,

    /// A recovery probe found a provider
    CognitionRestored,
}

impl fmt::Display for SurvivalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SurvivalReason::EthCritical => "ETH_CRITICAL",
            SurvivalReason::RunwayTerminal => "RUNWAY_TERMINAL",
            SurvivalReason::RunwayLow => "RUNWAY_LOW",
            SurvivalReason::CognitiveStarvation => "COGNITIVE_STARVATION",
            SurvivalReason::CognitionRestored => "COGNITION_RESTORED",
        };
        f.write_str(s)
    }
}

/// One survival-mode decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalDecision {
    pub action: SurvivalAction,

    /// 0 for death, 1-4 for survival priorities, none for resumption
    pub priority: Option<u8>,

    pub reason: SurvivalReason,

    /// Heartbeat interval the scheduler should switch to
    #[serde(default, with = "humane_option")]
    pub heartbeat_interval: Option<Duration>,

    /// Delay before the next recovery probe
    #[serde(default, with = "humane_option")]
    pub next_probe_in: Option<Duration>,

    /// Whether the agent should prepare for death
    #[serde(default)]
    pub prepare_for_death: bool,

    /// Provider found by a successful recovery probe
    #[serde(default)]
    pub provider: Option<String>,

    /// Cycle number within this degraded-mode episode
    pub cycle: u32,
}

impl SurvivalDecision {
    pub(crate) fn new(action: SurvivalAction, priority: Option<u8>, reason: SurvivalReason, cycle: u32) -> Self {
        Self {
            action,
            priority,
            reason,
            heartbeat_interval: None,
            next_probe_in: None,
            prepare_for_death: false,
            provider: None,
            cycle,
        }
    }

    /// True for decisions after which no further cycles are expected.
    pub fn is_terminal(&self) -> bool {
        self.action == SurvivalAction::Die
    }
}

/// Final record kept once the agent has died.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathRecord {
    pub activated_at: DateTime<Utc>,
    pub died_at: DateTime<Utc>,
    pub cycles: u32,
    pub recovery_attempts: u32,
    pub last_provider_error: Option<String>,
    pub decision: SurvivalDecision,
}
