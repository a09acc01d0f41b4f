//! Gas price oracle.

use crate::chains::{ChainApi, ChainError};
use async_trait::async_trait;
use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

/// Errors returned by the gas price oracle.
///
/// A failing oracle only skips the unstick pass for the current tick.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The underlying price source failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The oracle has no usable price.
    #[error("fast gas price unavailable: {0}")]
    Unavailable(String),
}

/// A pull-based source of fast gas prices, in wei.
#[async_trait]
pub trait GasOracle: Debug + Send + Sync {
    /// Returns the current fast gas price or fails.
    async fn fast_gas_price(&self) -> Result<u128, OracleError>;
}

/// Gas oracle backed by the node's `eth_gasPrice`.
#[derive(Debug)]
pub struct ChainGasOracle {
    chain: Arc<dyn ChainApi>,
}

impl ChainGasOracle {
    /// Creates a new [`ChainGasOracle`].
    pub fn new(chain: Arc<dyn ChainApi>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl GasOracle for ChainGasOracle {
    async fn fast_gas_price(&self) -> Result<u128, OracleError> {
        Ok(self.chain.gas_price().await?)
    }
}

/// A gas price observation taken at a certain time.
#[derive(Debug, Clone, Copy)]
struct PriceTick {
    price: u128,
    at: Instant,
}

/// Caching decorator for a [`GasOracle`] with a short TTL.
#[derive(Debug)]
pub struct CachedGasOracle<O> {
    inner: O,
    ttl: Duration,
    cached: Mutex<Option<PriceTick>>,
}

impl<O> CachedGasOracle<O> {
    /// Wraps an oracle, caching its answers for `ttl`.
    pub fn new(inner: O, ttl: Duration) -> Self {
        Self { inner, ttl, cached: Mutex::new(None) }
    }
}

#[async_trait]
impl<O: GasOracle> GasOracle for CachedGasOracle<O> {
    async fn fast_gas_price(&self) -> Result<u128, OracleError> {
        let mut cached = self.cached.lock().await;
        if let Some(tick) = *cached {
            if tick.at.elapsed() < self.ttl {
                return Ok(tick.price);
            }
        }

        let price = self.inner.fast_gas_price().await?;
        *cached = Some(PriceTick { price, at: Instant::now() });
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Default)]
    struct CountingOracle {
        calls: AtomicU64,
    }

    #[async_trait]
    impl GasOracle for CountingOracle {
        async fn fast_gas_price(&self) -> Result<u128, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        }
    }

    #[tokio::test]
    async fn cache_serves_within_ttl() {
        let oracle = CachedGasOracle::new(CountingOracle::default(), Duration::from_secs(60));

        assert_eq!(oracle.fast_gas_price().await.unwrap(), 42);
        assert_eq!(oracle.fast_gas_price().await.unwrap(), 42);
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_refreshes_after_ttl() {
        let oracle = CachedGasOracle::new(CountingOracle::default(), Duration::ZERO);

        oracle.fast_gas_price().await.unwrap();
        oracle.fast_gas_price().await.unwrap();
        assert_eq!(oracle.inner.calls.load(Ordering::SeqCst), 2);
    }
}
