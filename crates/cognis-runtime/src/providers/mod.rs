//! Reasoning backend abstractions for cognis-runtime.
//!
//! A backend is the only thing that actually talks to a provider. The
//! coordinator routes each call to the backend registered for the chosen
//! provider's protocol; transports themselves live outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use cognis_core::ProviderRecord;

mod router;

pub use router::BackendRouter;

/// Errors from reasoning backends.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No provider available")]
    NoProviderAvailable,

    #[error("Provider '{provider}' rejected the request: {reason}")]
    Rejected { provider: String, reason: String },

    #[error("Quoted price {quoted} exceeds ceiling {ceiling}")]
    BudgetExceeded { quoted: f64, ceiling: f64 },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// True for failures that mean reasoning is unreachable, as opposed to
    /// a provider refusing a specific request or a defect in the caller.
    pub fn is_cognitive(&self) -> bool {
        matches!(
            self,
            ProviderError::NoProviderAvailable
                | ProviderError::Timeout(_)
                | ProviderError::Network(_)
        )
    }
}

/// Limits for one backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    /// Tokens the call is expected to consume
    pub estimated_tokens: u32,

    /// Highest price the caller will accept, if capped
    pub max_cost: Option<f64>,

    /// Model tier chosen by the budget gate, if one ran
    pub model: Option<String>,

    /// Deadline applied around the call
    pub timeout: Duration,
}

/// Token usage reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Response from a reasoning call.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Amount actually charged, when the backend knows it
    pub actual_cost: Option<f64>,
}

impl BackendResponse {
    /// A response with no usage information.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            actual_cost: None,
        }
    }
}

/// Backend abstraction allows swapping provider transports.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Ask `provider` to reason about `prompt`.
    async fn call(
        &self,
        provider: &ProviderRecord,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<BackendResponse, ProviderError>;

    /// Check whether `provider` answers at all.
    async fn health_check(&self, provider: &ProviderRecord) -> bool;

    /// Backend name for logs.
    fn name(&self) -> &str;
}
