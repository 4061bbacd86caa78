//! Per-protocol backend routing.
//!
//! Backends register under the protocol they speak; the coordinator looks
//! one up for every call from the chosen provider's protocol tag.

use std::collections::BTreeMap;
use std::sync::Arc;

use cognis_core::{ProviderProtocol, ProviderRecord};

use super::{ProviderError, ReasoningBackend};

/// Backends keyed by protocol.
#[derive(Default, Clone)]
pub struct BackendRouter {
    backends: BTreeMap<ProviderProtocol, Arc<dyn ReasoningBackend>>,
}

impl BackendRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend for a protocol, replacing any existing one.
    pub fn register(
        &mut self,
        protocol: ProviderProtocol,
        backend: Arc<dyn ReasoningBackend>,
    ) -> Option<Arc<dyn ReasoningBackend>> {
        tracing::debug!(protocol = %protocol, backend = backend.name(), "Registering backend");
        self.backends.insert(protocol, backend)
    }

    /// Register the same backend for every protocol.
    pub fn with_fallback(backend: Arc<dyn ReasoningBackend>) -> Self {
        let mut router = Self::new();
        for protocol in [
            ProviderProtocol::Free,
            ProviderProtocol::MeteredPayment,
            ProviderProtocol::ApiKey,
        ] {
            router.register(protocol, backend.clone());
        }
        router
    }

    /// Backend for a provider.
    ///
    /// A missing backend is a wiring defect and surfaces as
    /// [`ProviderError::Other`].
    pub fn route(&self, provider: &ProviderRecord) -> Result<Arc<dyn ReasoningBackend>, ProviderError> {
        self.backends.get(&provider.protocol).cloned().ok_or_else(|| {
            ProviderError::Other(anyhow::anyhow!(
                "No backend registered for protocol '{}' (provider '{}'). Available: {:?}",
                provider.protocol,
                provider.id,
                self.protocols()
            ))
        })
    }

    /// Check if a protocol has a backend.
    pub fn has_backend(&self, protocol: ProviderProtocol) -> bool {
        self.backends.contains_key(&protocol)
    }

    /// Protocols with a registered backend.
    pub fn protocols(&self) -> Vec<ProviderProtocol> {
        self.backends.keys().copied().collect()
    }
}

impl std::fmt::Debug for BackendRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRouter")
            .field("protocols", &self.protocols())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{BackendResponse, CallOptions};
    use async_trait::async_trait;

    struct EchoBackend {
        name: String,
    }

    #[async_trait]
    impl ReasoningBackend for EchoBackend {
        async fn call(
            &self,
            _provider: &ProviderRecord,
            prompt: &str,
            _options: &CallOptions,
        ) -> Result<BackendResponse, ProviderError> {
            Ok(BackendResponse::text(prompt))
        }

        async fn health_check(&self, _provider: &ProviderRecord) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn echo(name: &str) -> Arc<dyn ReasoningBackend> {
        Arc::new(EchoBackend { name: name.into() })
    }

    #[test]
    fn test_routes_by_protocol() {
        let mut router = BackendRouter::new();
        router.register(ProviderProtocol::Free, echo("local"));
        router.register(ProviderProtocol::MeteredPayment, echo("x402"));

        let paid = ProviderRecord::new("p", "p", "http://p", ProviderProtocol::MeteredPayment);
        assert_eq!(router.route(&paid).unwrap().name(), "x402");
        assert!(router.has_backend(ProviderProtocol::Free));
        assert!(!router.has_backend(ProviderProtocol::ApiKey));
    }

    #[test]
    fn test_missing_backend_is_defect() {
        let router = BackendRouter::new();
        let provider = ProviderRecord::new("k", "k", "http://k", ProviderProtocol::ApiKey);

        match router.route(&provider) {
            Err(err @ ProviderError::Other(_)) => {
                assert!(!err.is_cognitive());
                assert!(err.to_string().contains("api-key"));
            }
            other => panic!("Expected Other error, got {:?}", other.map(|b| b.name().to_string())),
        }
    }

    #[test]
    fn test_fallback_covers_every_protocol() {
        let router = BackendRouter::with_fallback(echo("all"));
        assert_eq!(router.protocols().len(), 3);
    }
}
