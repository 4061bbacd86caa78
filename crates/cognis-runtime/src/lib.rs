//! # cognis-runtime
//!
//! Async decision coordinator for cognis agents.
//!
//! This crate wires the deterministic core in `cognis-core` to the outside
//! world: reasoning backends, a balance source, and the heartbeat scheduler.
//!
//! ## Important
//!
//! Transports are NOT implemented here. Provide a [`ReasoningBackend`] per
//! protocol and a [`BalanceSource`]; the coordinator handles selection,
//! reputation, budget gating, failure counting and the hand-off to
//! survival mode.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cognis_runtime::{BackendRouter, CycleOutcome, CycleRequest, DecisionCoordinator, FixedBalance};
//!
//! let coordinator = DecisionCoordinator::builder()
//!     .registry(roster.registry())
//!     .traits(roster.traits.clone())
//!     .router(BackendRouter::with_fallback(backend))
//!     .balance_source(Arc::new(FixedBalance(25.0)))
//!     .build()?;
//!
//! match coordinator.run_cycle(CycleRequest::new("Summarize the ledger", Criticality::Medium)).await? {
//!     CycleOutcome::Completed { content, .. } => println!("{content}"),
//!     CycleOutcome::Retry { delay, .. } => tokio::time::sleep(delay).await,
//!     CycleOutcome::Survival(decision) => println!("{}", decision.action),
//! }
//! ```

pub mod balance;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod history;
pub mod providers;
pub mod resilience;
pub mod signal;

pub use balance::{BalanceCache, BalanceError, BalanceSource, FixedBalance};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, RuntimeConfig};
pub use coordinator::{
    BudgetGate, CoordinatorStatus, CycleOutcome, CycleRequest, DecisionCoordinator,
    DecisionCoordinatorBuilder,
};
pub use history::{DecisionHistory, DecisionRecord};
pub use providers::{
    BackendResponse, BackendRouter, CallOptions, ProviderError, ReasoningBackend, TokenUsage,
};
pub use resilience::{CognitiveFailureGate, FailureGateConfig, GateVerdict, SpendLedger, SpendSummary};
pub use signal::ChannelPowerSignal;

use cognis_core::{RegistryError, SurvivalError};
use thiserror::Error;

/// Errors from the coordinator.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("A cycle is already in progress")]
    CycleInProgress,

    #[error("Survival error: {0}")]
    Survival(#[from] SurvivalError),

    #[error("Provider defect: {0}")]
    Defect(#[source] ProviderError),

    #[error("Balance error: {0}")]
    Balance(#[from] BalanceError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Coordinator not configured: {0}")]
    NotConfigured(String),
}
