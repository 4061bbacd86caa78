//! Personality-driven selection strategies.
//!
//! Strategies form an ordered table of predicate/picker pairs. The first
//! rule whose predicate holds picks the provider:
//! 1. Extreme frugality
//! 2. High stakes
//! 3. Risk aversion
//! 4. Balanced quality per cost (always applies)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::provider::ProviderRecord;
use crate::types::{CognitiveTraits, Criticality};

/// Savings tendency above which the agent only looks at free reasoning.
pub const FRUGAL_SAVINGS_THRESHOLD: f64 = 0.8;

/// Balance below which the agent becomes frugal regardless of traits.
pub const FRUGAL_BALANCE_FLOOR: f64 = 2.0;

/// Balance above which high-criticality tasks may buy the best reasoning.
pub const HIGH_STAKES_BALANCE: f64 = 5.0;

/// Cognition quality above which high-stakes tasks prefer paid quality.
pub const HIGH_COGNITION_THRESHOLD: f64 = 0.7;

/// Risk appetite below which reliability dominates.
pub const RISK_AVERSE_THRESHOLD: f64 = 0.3;

/// Success rates within this band are treated as equivalent.
pub const SUCCESS_TIE_BAND: f64 = 0.1;

/// Slack for float noise when comparing against [`SUCCESS_TIE_BAND`].
const TIE_BAND_EPSILON: f64 = 1e-9;

/// Cost floor used when dividing by price.
pub const MIN_COST_DIVISOR: f64 = 0.001;

/// Which strategy picked a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExtremeFrugality,
    HighStakes,
    RiskAverse,
    Balanced,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::ExtremeFrugality => "extreme_frugality",
            StrategyKind::HighStakes => "high_stakes",
            StrategyKind::RiskAverse => "risk_averse",
            StrategyKind::Balanced => "balanced",
        };
        f.write_str(s)
    }
}

/// Inputs every strategy predicate sees.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub traits: &'a CognitiveTraits,
    pub criticality: Criticality,
    pub balance: f64,
}

/// A provider that survived filtering, with its estimated call cost.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub provider: &'a ProviderRecord,
    pub cost: f64,
}

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct StrategyRule {
    pub kind: StrategyKind,
    pub applies: fn(&StrategyContext<'_>) -> bool,
    pub pick: fn(&StrategyContext<'_>, &[Candidate<'_>]) -> Option<usize>,
}

impl fmt::Debug for StrategyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRule").field("kind", &self.kind).finish()
    }
}

/// The standard dispatch table, in priority order.
pub fn default_rules() -> Vec<StrategyRule> {
    vec![
        StrategyRule {
            kind: StrategyKind::ExtremeFrugality,
            applies: is_frugal,
            pick: pick_frugal,
        },
        StrategyRule {
            kind: StrategyKind::HighStakes,
            applies: is_high_stakes,
            pick: pick_high_stakes,
        },
        StrategyRule {
            kind: StrategyKind::RiskAverse,
            applies: is_risk_averse,
            pick: pick_risk_averse,
        },
        StrategyRule {
            kind: StrategyKind::Balanced,
            applies: always,
            pick: pick_balanced,
        },
    ]
}

pub fn is_frugal(ctx: &StrategyContext<'_>) -> bool {
    ctx.traits.savings_tendency > FRUGAL_SAVINGS_THRESHOLD || ctx.balance < FRUGAL_BALANCE_FLOOR
}

pub fn is_high_stakes(ctx: &StrategyContext<'_>) -> bool {
    ctx.criticality.is_high_stakes() && ctx.balance > HIGH_STAKES_BALANCE
}

pub fn is_risk_averse(ctx: &StrategyContext<'_>) -> bool {
    ctx.traits.risk_appetite < RISK_AVERSE_THRESHOLD
}

fn always(_ctx: &StrategyContext<'_>) -> bool {
    true
}

/// Free providers ranked by latency-adjusted reliability, else the cheapest.
fn pick_frugal(_ctx: &StrategyContext<'_>, candidates: &[Candidate<'_>]) -> Option<usize> {
    let free = first_max_by(candidates, |c| c.provider.is_free(), |c| {
        let p = c.provider;
        p.quality_score * p.success_rate * (1.0 / (1.0 + p.avg_latency_ms / 1000.0))
    });
    free.or_else(|| first_min_by(candidates, |_| true, |c| c.provider.cost_per_1k_tokens))
}

fn pick_high_stakes(ctx: &StrategyContext<'_>, candidates: &[Candidate<'_>]) -> Option<usize> {
    if ctx.traits.cognition_quality > HIGH_COGNITION_THRESHOLD {
        first_max_by(candidates, |c| !c.provider.is_free(), |c| c.provider.quality_score)
            .or_else(|| first_max_by(candidates, |_| true, |c| c.provider.quality_score))
    } else {
        first_max_by(candidates, |_| true, |c| c.provider.success_rate)
    }
}

/// Most reliable provider; near-ties go to the cheaper one.
fn pick_risk_averse(_ctx: &StrategyContext<'_>, candidates: &[Candidate<'_>]) -> Option<usize> {
    let best = candidates
        .iter()
        .map(|c| c.provider.success_rate)
        .max_by(f64::total_cmp)?;

    let mut chosen: Option<usize> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        if best - candidate.provider.success_rate > SUCCESS_TIE_BAND + TIE_BAND_EPSILON {
            continue;
        }
        let better = match chosen {
            None => true,
            Some(current) => {
                let current = candidates[current].provider;
                let p = candidate.provider;
                match p.cost_per_1k_tokens.total_cmp(&current.cost_per_1k_tokens) {
                    Ordering::Less => true,
                    Ordering::Equal => p.success_rate > current.success_rate,
                    Ordering::Greater => false,
                }
            }
        };
        if better {
            chosen = Some(idx);
        }
    }
    chosen
}

fn pick_balanced(_ctx: &StrategyContext<'_>, candidates: &[Candidate<'_>]) -> Option<usize> {
    first_max_by(candidates, |_| true, |c| {
        let p = c.provider;
        (p.quality_score * p.success_rate) / p.cost_per_1k_tokens.max(MIN_COST_DIVISOR)
    })
}

/// Index of the first candidate with the highest score among those kept.
fn first_max_by(
    candidates: &[Candidate<'_>],
    keep: impl Fn(&Candidate<'_>) -> bool,
    score: impl Fn(&Candidate<'_>) -> f64,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in candidates.iter().enumerate().filter(|(_, c)| keep(c)) {
        let value = score(candidate);
        if best.map_or(true, |(_, b)| value.total_cmp(&b) == Ordering::Greater) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Index of the first candidate with the lowest score among those kept.
fn first_min_by(
    candidates: &[Candidate<'_>],
    keep: impl Fn(&Candidate<'_>) -> bool,
    score: impl Fn(&Candidate<'_>) -> f64,
) -> Option<usize> {
    first_max_by(candidates, keep, |c| -score(c))
}
