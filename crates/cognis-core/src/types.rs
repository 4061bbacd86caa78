//! Shared data types for cognis decisions.
//!
//! These are the values that flow between the registry, the selection
//! engine, the budget evaluator and the survival machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal importance of a task.
///
/// Ordering matters: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Criticality {
    /// Numeric weight used in budget value scoring.
    pub fn weight(self) -> f64 {
        match self {
            Criticality::Low => 1.0,
            Criticality::Medium => 2.0,
            Criticality::High => 3.0,
            Criticality::Critical => 4.0,
        }
    }

    /// True for tasks that trigger the high-stakes selection strategy.
    pub fn is_high_stakes(self) -> bool {
        matches!(self, Criticality::High | Criticality::Critical)
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// How much reasoning a task needs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
    #[default]
    Standard,
    Complex,
    Critical,
}

impl TaskComplexity {
    /// Numeric weight used in budget value scoring.
    pub fn weight(self) -> f64 {
        match self {
            TaskComplexity::Standard => 1.0,
            TaskComplexity::Complex => 2.0,
            TaskComplexity::Critical => 3.0,
        }
    }

    /// Completion tokens a task of this complexity is expected to produce.
    pub fn expected_completion_tokens(self) -> u32 {
        match self {
            TaskComplexity::Standard => 500,
            TaskComplexity::Complex => 1500,
            TaskComplexity::Critical => 3000,
        }
    }
}

impl fmt::Display for TaskComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskComplexity::Standard => "standard",
            TaskComplexity::Complex => "complex",
            TaskComplexity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// How the agent reacts under pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StressResponse {
    Fight,
    Flight,
    Freeze,
    #[default]
    Adapt,
}

/// Personality traits that steer provider selection.
///
/// All scalars are clamped to `[0, 1]`. Values are handed out by copy;
/// holders never expose a live reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitiveTraits {
    /// Willingness to use unproven providers
    pub risk_appetite: f64,

    /// Preference for free or cheap reasoning
    pub savings_tendency: f64,

    /// Preference for the highest-quality reasoning
    pub cognition_quality: f64,

    /// Willingness to cooperate with other agents
    pub cooperation_tendency: f64,

    /// Reaction under pressure
    pub stress_response: StressResponse,
}

impl Default for CognitiveTraits {
    fn default() -> Self {
        Self {
            risk_appetite: 0.5,
            savings_tendency: 0.5,
            cognition_quality: 0.5,
            cooperation_tendency: 0.5,
            stress_response: StressResponse::Adapt,
        }
    }
}

impl CognitiveTraits {
    /// Return a copy with every scalar clamped to `[0, 1]`.
    pub fn clamped(mut self) -> Self {
        self.risk_appetite = clamp_unit(self.risk_appetite);
        self.savings_tendency = clamp_unit(self.savings_tendency);
        self.cognition_quality = clamp_unit(self.cognition_quality);
        self.cooperation_tendency = clamp_unit(self.cooperation_tendency);
        self
    }

    /// Merge a partial patch into these traits.
    pub fn apply(&mut self, patch: &TraitsPatch) {
        if let Some(v) = patch.risk_appetite {
            self.risk_appetite = clamp_unit(v);
        }
        if let Some(v) = patch.savings_tendency {
            self.savings_tendency = clamp_unit(v);
        }
        if let Some(v) = patch.cognition_quality {
            self.cognition_quality = clamp_unit(v);
        }
        if let Some(v) = patch.cooperation_tendency {
            self.cooperation_tendency = clamp_unit(v);
        }
        if let Some(v) = patch.stress_response {
            self.stress_response = v;
        }
    }
}

/// Partial update for [`CognitiveTraits`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitsPatch {
    pub risk_appetite: Option<f64>,
    pub savings_tendency: Option<f64>,
    pub cognition_quality: Option<f64>,
    pub cooperation_tendency: Option<f64>,
    pub stress_response: Option<StressResponse>,
}

/// Per-cycle economic snapshot used by the survival machine.
///
/// Supplied fresh each cycle and never stored by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurvivalContext {
    /// Fungible balance
    pub balance: f64,

    /// Gas-equivalent balance used to pay for on-chain actions
    pub gas_balance: f64,

    /// Estimated remaining days of survival at current burn
    pub estimated_days: f64,

    /// Consecutive cognitive failures observed by the caller
    pub consecutive_failures: u32,
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
