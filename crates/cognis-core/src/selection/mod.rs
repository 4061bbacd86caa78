//! Selection engine: picks exactly one provider for a reasoning request.
//!
//! Selection runs in two steps:
//! 1. **Affordability filter**: keep candidates where
//!    `balance >= min_balance_required + estimated cost`. If none survive,
//!    fall back to free candidates. If there are none of those either,
//!    there is no provider.
//! 2. **Strategy dispatch**: the first matching rule of the
//!    [`strategies`] table picks among the survivors.
//!
//! Selection is a pure function of its inputs. Returning `None` is the
//! only signal that sends the agent toward survival mode.

pub mod strategies;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderRecord;
use crate::types::{CognitiveTraits, Criticality};
pub use strategies::{Candidate, StrategyContext, StrategyKind, StrategyRule};

/// What the caller wants to reason about.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRequest {
    /// Task importance
    pub criticality: Criticality,

    /// Tokens the call is expected to consume
    pub estimated_tokens: u32,

    /// Restrict candidates to free providers
    #[serde(default)]
    pub free_only: bool,
}

impl SelectionRequest {
    /// Create a request for any provider.
    pub fn new(criticality: Criticality, estimated_tokens: u32) -> Self {
        Self {
            criticality,
            estimated_tokens,
            free_only: false,
        }
    }

    /// Restrict the request to free providers.
    pub fn free_only(mut self) -> Self {
        self.free_only = true;
        self
    }
}

/// Where the chosen candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Passed the affordability filter
    Affordable,

    /// Nothing was affordable; chosen among free providers
    FreeFallback,
}

/// The provider chosen for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub provider: ProviderRecord,
    pub strategy: StrategyKind,
    pub estimated_cost: f64,
    pub source: CandidateSource,
}

/// Applies the affordability filter and strategy table.
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    rules: Vec<StrategyRule>,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(strategies::default_rules())
    }
}

impl SelectionEngine {
    /// Create an engine with a custom rule table.
    pub fn new(rules: Vec<StrategyRule>) -> Self {
        Self { rules }
    }

    /// The rule table, in priority order.
    pub fn rules(&self) -> &[StrategyRule] {
        &self.rules
    }

    /// Pick one provider, or `None` when nothing usable remains.
    pub fn select(
        &self,
        request: &SelectionRequest,
        traits: &CognitiveTraits,
        balance: f64,
        providers: &[ProviderRecord],
    ) -> Option<Selection> {
        let pool: Vec<&ProviderRecord> = providers
            .iter()
            .filter(|p| !request.free_only || p.is_free())
            .collect();

        let (candidates, source) = affordable_candidates(&pool, request.estimated_tokens, balance);
        if candidates.is_empty() {
            tracing::debug!(
                balance,
                candidates = providers.len(),
                "No affordable or free provider available"
            );
            return None;
        }

        let ctx = StrategyContext {
            traits,
            criticality: request.criticality,
            balance,
        };

        let rule = self.rules.iter().find(|rule| (rule.applies)(&ctx))?;
        let idx = (rule.pick)(&ctx, &candidates)?;
        let chosen = candidates[idx];

        tracing::debug!(
            provider = %chosen.provider.id,
            strategy = %rule.kind,
            cost = chosen.cost,
            balance,
            "Provider selected"
        );

        Some(Selection {
            provider: chosen.provider.clone(),
            strategy: rule.kind,
            estimated_cost: chosen.cost,
            source,
        })
    }
}

fn affordable_candidates<'a>(
    pool: &[&'a ProviderRecord],
    estimated_tokens: u32,
    balance: f64,
) -> (Vec<Candidate<'a>>, CandidateSource) {
    let affordable: Vec<Candidate<'a>> = pool
        .iter()
        .map(|&provider| Candidate {
            provider,
            cost: provider.estimate_cost(estimated_tokens),
        })
        .filter(|c| balance >= c.provider.min_balance_required + c.cost)
        .collect();

    if !affordable.is_empty() {
        return (affordable, CandidateSource::Affordable);
    }

    let free = pool
        .iter()
        .filter(|p| p.is_selectable() && p.is_free())
        .map(|&provider| Candidate { provider, cost: 0.0 })
        .collect();
    (free, CandidateSource::FreeFallback)
}
