//! Budget evaluation: is a task worth paying for, and with which model?
//!
//! Independent of provider choice. Decision order:
//! 1. Standard complexity never pays.
//! 2. Balance under the survival reserve never pays.
//! 3. The task's allotted budget must cover the cheapest paid model.
//! 4. Value must beat cost, and a 20%-buffered estimate must fit both the
//!    budget and the spendable balance. The most expensive fitting model
//!    wins (price stands in for quality).
//! 5. Otherwise, don't pay.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Criticality, TaskComplexity};

/// Balance that paid reasoning may never touch.
pub const SURVIVAL_RESERVE: f64 = 0.5;

/// Safety margin applied to cost estimates before committing.
pub const COST_BUFFER: f64 = 1.2;

/// Paid models cheaper than this are not trusted with critical tasks.
pub const CRITICAL_PRICE_FLOOR: f64 = 0.003;

/// A model the agent can ask a provider for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier
    pub id: String,

    /// Price per 1000 tokens (0 for free tiers)
    pub cost_per_1k_tokens: f64,

    /// Hardest task this model handles
    pub max_complexity: TaskComplexity,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, cost_per_1k_tokens: f64, max_complexity: TaskComplexity) -> Self {
        Self {
            id: id.into(),
            cost_per_1k_tokens,
            max_complexity,
        }
    }

    pub fn is_free(&self) -> bool {
        self.cost_per_1k_tokens == 0.0
    }

    pub fn estimate_cost(&self, tokens: u32) -> f64 {
        self.cost_per_1k_tokens * tokens as f64 / 1000.0
    }
}

/// Known models, free and paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub models: Vec<ModelSpec>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: vec![
                ModelSpec::new("local-small", 0.0, TaskComplexity::Standard),
                ModelSpec::new("local-large", 0.0, TaskComplexity::Complex),
                ModelSpec::new("economy", 0.0005, TaskComplexity::Complex),
                ModelSpec::new("balanced", 0.003, TaskComplexity::Critical),
                ModelSpec::new("frontier", 0.015, TaskComplexity::Critical),
            ],
        }
    }
}

impl ModelCatalog {
    /// Cheapest free model that handles `complexity`, else any free model.
    pub fn free_model_for(&self, complexity: TaskComplexity) -> Option<&ModelSpec> {
        let free = || self.models.iter().filter(|m| m.is_free());
        free()
            .filter(|m| m.max_complexity >= complexity)
            .min_by_key(|m| m.max_complexity)
            .or_else(|| free().max_by_key(|m| m.max_complexity))
    }

    /// Paid models eligible for a task of `complexity`.
    fn paid_models_for(&self, complexity: TaskComplexity) -> impl Iterator<Item = &ModelSpec> {
        self.models.iter().filter(move |m| {
            !m.is_free()
                && (complexity != TaskComplexity::Critical
                    || m.cost_per_1k_tokens >= CRITICAL_PRICE_FLOOR)
        })
    }
}

/// Spend allotted to one task.
///
/// The allotment is a fraction of the metabolic cost of the unit that
/// originated the task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskBudget {
    pub metabolic_cost: f64,
    pub fraction: f64,
}

impl TaskBudget {
    pub fn new(metabolic_cost: f64, fraction: f64) -> Self {
        Self {
            metabolic_cost,
            fraction,
        }
    }

    /// Spend this task may use.
    pub fn allotted(&self) -> f64 {
        (self.metabolic_cost * self.fraction).max(0.0)
    }
}

/// Why the evaluator decided what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetReason {
    StandardComplexity,
    SurvivalReserve,
    InsufficientBudget,
    ValueBelowCost,
    NoAffordableModel,
    Approved,
}

impl fmt::Display for BudgetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BudgetReason::StandardComplexity => "standard complexity runs on free models",
            BudgetReason::SurvivalReserve => "balance is below the survival reserve",
            BudgetReason::InsufficientBudget => "allotted budget cannot cover the cheapest paid model",
            BudgetReason::ValueBelowCost => "task value does not justify its cost",
            BudgetReason::NoAffordableModel => "no paid model fits the budget and spendable balance",
            BudgetReason::Approved => "paid reasoning approved",
        };
        f.write_str(s)
    }
}

/// Outcome of a budget evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEvaluation {
    pub should_pay: bool,
    pub model: Option<String>,
    pub estimated_cost: f64,
    pub reason: BudgetReason,
}

/// Decides whether a task justifies paid reasoning.
#[derive(Debug, Clone, Default)]
pub struct BudgetEvaluator {
    catalog: ModelCatalog,
}

impl BudgetEvaluator {
    pub fn new(catalog: ModelCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Tokens expected for a prompt of `prompt_length` characters.
    pub fn estimate_tokens(prompt_length: usize, complexity: TaskComplexity) -> u32 {
        let prompt_tokens = prompt_length.div_ceil(4);
        u32::try_from(prompt_tokens)
            .unwrap_or(u32::MAX)
            .saturating_add(complexity.expected_completion_tokens())
    }

    /// Evaluate one task.
    pub fn evaluate(
        &self,
        budget: &TaskBudget,
        complexity: TaskComplexity,
        prompt_length: usize,
        balance: f64,
        criticality: Criticality,
    ) -> BudgetEvaluation {
        if complexity == TaskComplexity::Standard {
            return self.decline(complexity, BudgetReason::StandardComplexity);
        }

        if balance < SURVIVAL_RESERVE {
            return self.decline(complexity, BudgetReason::SurvivalReserve);
        }

        let tokens = Self::estimate_tokens(prompt_length, complexity);
        let allotted = budget.allotted();

        let cheapest = self
            .catalog
            .paid_models_for(complexity)
            .map(|m| m.estimate_cost(tokens))
            .min_by(f64::total_cmp);
        match cheapest {
            Some(cost) if cost <= allotted => {}
            _ => return self.decline(complexity, BudgetReason::InsufficientBudget),
        }

        let value_score = criticality.weight() * complexity.weight() * 10.0;
        let cost_score = allotted * 100.0;
        if value_score <= cost_score {
            return self.decline(complexity, BudgetReason::ValueBelowCost);
        }

        let spendable = balance - SURVIVAL_RESERVE;
        let chosen = self
            .catalog
            .paid_models_for(complexity)
            .filter(|m| {
                let buffered = m.estimate_cost(tokens) * COST_BUFFER;
                buffered <= allotted && buffered <= spendable
            })
            .max_by(|a, b| a.cost_per_1k_tokens.total_cmp(&b.cost_per_1k_tokens));

        match chosen {
            Some(model) => {
                let estimated_cost = model.estimate_cost(tokens);
                tracing::debug!(
                    model = %model.id,
                    estimated_cost,
                    value_score,
                    cost_score,
                    "Paid reasoning approved"
                );
                BudgetEvaluation {
                    should_pay: true,
                    model: Some(model.id.clone()),
                    estimated_cost,
                    reason: BudgetReason::Approved,
                }
            }
            None => self.decline(complexity, BudgetReason::NoAffordableModel),
        }
    }

    fn decline(&self, complexity: TaskComplexity, reason: BudgetReason) -> BudgetEvaluation {
        BudgetEvaluation {
            should_pay: false,
            model: self.catalog.free_model_for(complexity).map(|m| m.id.clone()),
            estimated_cost: 0.0,
            reason,
        }
    }
}

/// Spending posture derived from runway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Survival,
    Economy,
    Standard,
    Premium,
}

impl BudgetTier {
    /// Hardest task complexity this tier may request.
    pub fn max_complexity(self) -> TaskComplexity {
        match self {
            BudgetTier::Survival | BudgetTier::Economy => TaskComplexity::Standard,
            BudgetTier::Standard => TaskComplexity::Complex,
            BudgetTier::Premium => TaskComplexity::Critical,
        }
    }

    /// Clamp a requested complexity to what this tier allows.
    pub fn cap(self, complexity: TaskComplexity) -> TaskComplexity {
        complexity.min(self.max_complexity())
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BudgetTier::Survival => "survival",
            BudgetTier::Economy => "economy",
            BudgetTier::Standard => "standard",
            BudgetTier::Premium => "premium",
        };
        f.write_str(s)
    }
}

/// Runway in days; infinite when nothing is being spent.
pub fn runway_days(balance: f64, daily_cost: f64) -> f64 {
    if daily_cost <= 0.0 {
        f64::INFINITY
    } else {
        balance / daily_cost
    }
}

/// Spending tier for a balance and daily burn.
pub fn budget_strategy(balance: f64, daily_cost: f64) -> BudgetTier {
    let runway = runway_days(balance, daily_cost);
    if balance < 1.0 || runway < 3.0 {
        BudgetTier::Survival
    } else if runway < 7.0 {
        BudgetTier::Economy
    } else if runway < 30.0 {
        BudgetTier::Standard
    } else {
        BudgetTier::Premium
    }
}
