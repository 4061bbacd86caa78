//! Cached balance reads.
//!
//! The balance source is slow and external. Reads inside the TTL are
//! served from cache; reads past it return the stale value immediately
//! and start one background refresh. Callers therefore see a balance that
//! is at most one TTL period plus one refresh old.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Default time a fetched balance is considered fresh.
pub const DEFAULT_BALANCE_TTL: Duration = Duration::from_secs(30);

/// Errors from balance reads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BalanceError {
    #[error("Balance source unavailable: {0}")]
    Unavailable(String),
}

/// Where balances come from (ledger, wallet, test fixture).
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balance(&self) -> Result<f64, BalanceError>;
}

/// A source that always reports the same balance.
#[derive(Debug, Clone, Copy)]
pub struct FixedBalance(pub f64);

#[async_trait]
impl BalanceSource for FixedBalance {
    async fn fetch_balance(&self) -> Result<f64, BalanceError> {
        Ok(self.0)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    value: Option<f64>,
    fetched_at: Option<Instant>,
    refreshing: bool,
}

/// Stale-while-revalidate balance cache.
pub struct BalanceCache {
    source: Arc<dyn BalanceSource>,
    ttl: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl std::fmt::Debug for BalanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceCache")
            .field("ttl", &self.ttl)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl BalanceCache {
    pub fn new(source: Arc<dyn BalanceSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Fetch from the source and wait for the result.
    pub async fn prime(&self) -> Result<f64, BalanceError> {
        let balance = self.source.fetch_balance().await?;
        let mut state = self.state.lock();
        state.value = Some(balance);
        state.fetched_at = Some(Instant::now());
        Ok(balance)
    }

    /// Current balance.
    ///
    /// Only the very first read waits for the source.
    pub async fn get(&self) -> Result<f64, BalanceError> {
        let cached = {
            let state = self.state.lock();
            state.value.map(|value| {
                let stale = state
                    .fetched_at
                    .map_or(true, |at| at.elapsed() >= self.ttl);
                (value, stale)
            })
        };

        match cached {
            None => self.prime().await,
            Some((value, stale)) => {
                if stale {
                    self.spawn_refresh();
                }
                Ok(value)
            }
        }
    }

    /// Cached value without touching the source.
    pub fn peek(&self) -> Option<f64> {
        self.state.lock().value
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn spawn_refresh(&self) {
        {
            let mut state = self.state.lock();
            if state.refreshing {
                return;
            }
            state.refreshing = true;
        }

        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let result = source.fetch_balance().await;
            let mut state = state.lock();
            state.refreshing = false;
            match result {
                Ok(balance) => {
                    state.value = Some(balance);
                    state.fetched_at = Some(Instant::now());
                    tracing::debug!(balance, "Balance refreshed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Balance refresh failed, keeping stale value");
                }
            }
        });
    }
}
