//! # cognis-core
//!
//! Deterministic decision core for autonomous economic agents.
//!
//! This crate answers, without ever calling a provider:
//! - Which reasoning provider should this task use?
//! - Is paid reasoning worth its cost right now?
//! - What should the agent do when no reasoning is reachable?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same registry, traits and balance always select the same provider
//! 2. **Affordable**: A paid provider is only chosen when the balance covers its minimum plus the call
//! 3. **Explicit time**: Time-dependent logic takes `now` as an argument
//! 4. **Typed outcomes**: "No provider" is a value, not an error
//!
//! ## Example
//!
//! ```rust,ignore
//! use cognis_core::{CognitiveTraits, Criticality, Roster, SelectionEngine, SelectionRequest};
//!
//! let roster = Roster::from_file("providers.yaml")?;
//! let registry = roster.registry();
//! let request = SelectionRequest::new(Criticality::High, 1200);
//!
//! match SelectionEngine::default().select(&request, &roster.traits, 42.0, &registry.list_available()) {
//!     Some(selection) => println!("{} via {}", selection.provider.id, selection.strategy),
//!     None => println!("no provider: enter survival mode"),
//! }
//! ```

pub mod budget;
pub mod durations;
pub mod provider;
pub mod quality;
pub mod reputation;
pub mod selection;
pub mod signals;
pub mod survival;
pub mod types;

// Re-export main types at crate root
pub use budget::{
    budget_strategy, runway_days, BudgetEvaluation, BudgetEvaluator, BudgetReason, BudgetTier,
    ModelCatalog, ModelSpec, TaskBudget,
};
pub use provider::{
    ProviderProtocol, ProviderRecord, ProviderRegistry, RegistryError, Roster, RosterError,
};
pub use quality::{FixedScorer, MarkupHeuristicScorer, QualityScorer};
pub use reputation::{CallOutcome, ReputationTracker, ReputationUpdate};
pub use selection::{CandidateSource, Selection, SelectionEngine, SelectionRequest, StrategyKind};
pub use signals::{NoopSignal, PowerMode, PowerSaveSignal};
pub use survival::{
    DeathRecord, InstinctPhase, InstinctState, RecoveryProbe, SurvivalAction, SurvivalConfig,
    SurvivalDecision, SurvivalError, SurvivalMachine, SurvivalReason, SurvivalStatus,
};
pub use types::{
    CognitiveTraits, Criticality, StressResponse, SurvivalContext, TaskComplexity, TraitsPatch,
};
