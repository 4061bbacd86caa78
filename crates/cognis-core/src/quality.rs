//! Response quality scoring.
//!
//! The coordinator blends the score into a provider's reputation after
//! each successful call. Scorers are pluggable; the default is a cheap
//! structural heuristic, not a judgment of correctness.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Fenced code block opener
    static ref CODE_FENCE_PATTERN: Regex = Regex::new(r"(?m)^\s*```").unwrap();

    /// Bulleted or numbered list item
    static ref LIST_ITEM_PATTERN: Regex = Regex::new(r"(?m)^\s*(?:[-*+]|\d+[.)])\s+\S").unwrap();

    /// Markdown heading
    static ref HEADING_PATTERN: Regex = Regex::new(r"(?m)^\s*#{1,6}\s+\S").unwrap();
}

/// Scores a provider response in [0, 1].
pub trait QualityScorer: Send + Sync {
    fn score(&self, prompt: &str, response: &str) -> f64;
}

/// Length and markup heuristic.
///
/// Starts at a base score, adds a bonus for substantial length and for
/// each kind of structure present. Empty responses score 0.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupHeuristicScorer {
    pub base: f64,
    pub length_threshold: usize,
    pub length_bonus: f64,
    pub structure_bonus: f64,
}

impl Default for MarkupHeuristicScorer {
    fn default() -> Self {
        Self {
            base: 0.5,
            length_threshold: 200,
            length_bonus: 0.2,
            structure_bonus: 0.1,
        }
    }
}

impl QualityScorer for MarkupHeuristicScorer {
    fn score(&self, _prompt: &str, response: &str) -> f64 {
        let trimmed = response.trim();
        if trimmed.is_empty() {
            return 0.0;
        }

        let mut score = self.base;
        if trimmed.len() >= self.length_threshold {
            score += self.length_bonus;
        }

        let structures = [&*CODE_FENCE_PATTERN, &*LIST_ITEM_PATTERN, &*HEADING_PATTERN]
            .iter()
            .filter(|pattern| pattern.is_match(trimmed))
            .count();
        score += self.structure_bonus * structures as f64;

        score.clamp(0.0, 1.0)
    }
}

/// Scorer that returns the same value for every response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScorer(pub f64);

impl QualityScorer for FixedScorer {
    fn score(&self, _prompt: &str, _response: &str) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}
