//! Cumulative reasoning spend.
//!
//! Tracks calls, tokens and money actually spent across cycles so the
//! agent can compare its estimates with what providers charged.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

/// Accumulated usage for one provider or for the whole agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendSummary {
    /// Number of successful calls
    pub calls: u32,

    /// Prompt tokens
    pub prompt_tokens: u64,

    /// Completion tokens
    pub completion_tokens: u64,

    /// Sum of estimates made before calling
    pub estimated_cost: f64,

    /// Sum of what was actually charged
    pub actual_cost: f64,
}

impl SpendSummary {
    /// Add one call.
    pub fn add(&mut self, usage: &TokenUsage, estimated_cost: f64, actual_cost: f64) {
        self.calls += 1;
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.estimated_cost += estimated_cost;
        self.actual_cost += actual_cost;
    }

    /// Total tokens used.
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Spend ledger for the agent's lifetime.
#[derive(Debug, Default)]
pub struct SpendLedger {
    /// Calls that failed after being dispatched
    failed_calls: AtomicU32,

    total: RwLock<SpendSummary>,

    per_provider: RwLock<BTreeMap<String, SpendSummary>>,
}

impl SpendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call.
    pub fn record(&self, provider_id: &str, usage: &TokenUsage, estimated_cost: f64, actual_cost: f64) {
        self.total.write().add(usage, estimated_cost, actual_cost);
        self.per_provider
            .write()
            .entry(provider_id.to_string())
            .or_default()
            .add(usage, estimated_cost, actual_cost);
    }

    /// Record a dispatched call that failed.
    pub fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Totals across every provider.
    pub fn summary(&self) -> SpendSummary {
        self.total.read().clone()
    }

    /// Totals for one provider.
    pub fn provider_summary(&self, provider_id: &str) -> Option<SpendSummary> {
        self.per_provider.read().get(provider_id).cloned()
    }

    /// Dispatched calls that failed with a cognitive error.
    pub fn failed_calls(&self) -> u32 {
        self.failed_calls.load(Ordering::SeqCst)
    }
}
