//! Resilience patterns for cognis-runtime.
//!
//! This module provides:
//! - System-wide cognitive failure gate with bounded exponential backoff
//! - Spend ledger across cycles

mod failure_gate;
mod spend;

pub use failure_gate::{CognitiveFailureGate, FailureGateConfig, GateVerdict};
pub use spend::{SpendLedger, SpendSummary};
