//! Bounded log of routing decisions.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use cognis_core::{CandidateSource, CognitiveTraits, StrategyKind};

/// Default number of decisions retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub provider_id: String,
    pub strategy: StrategyKind,
    pub source: CandidateSource,
    pub estimated_cost: f64,

    /// Charged amount; absent when the call did not complete
    pub actual_cost: Option<f64>,

    pub traits: CognitiveTraits,
    pub balance: f64,
}

/// Append-only ring of the most recent decisions.
#[derive(Debug)]
pub struct DecisionHistory {
    capacity: usize,
    entries: RwLock<VecDeque<DecisionRecord>>,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a decision, evicting the oldest past capacity.
    pub(crate) fn push(&self, record: DecisionRecord) {
        let mut entries = self.entries.write();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// Retained decisions, oldest first.
    pub fn entries(&self) -> Vec<DecisionRecord> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DecisionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> DecisionRecord {
        DecisionRecord {
            timestamp: Utc::now(),
            provider_id: format!("p{n}"),
            strategy: StrategyKind::Balanced,
            source: CandidateSource::Affordable,
            estimated_cost: 0.0,
            actual_cost: None,
            traits: CognitiveTraits::default(),
            balance: 10.0,
        }
    }

    #[test]
    fn test_history_keeps_most_recent() {
        let history = DecisionHistory::default();
        for n in 0..105 {
            history.push(record(n));
        }

        let entries = history.entries();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].provider_id, "p5");
        assert_eq!(entries[99].provider_id, "p104");
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let history = DecisionHistory::new(0);
        history.push(record(1));
        history.push(record(2));
        assert_eq!(history.len(), 1);
    }
}
