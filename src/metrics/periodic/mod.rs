//! Periodic metric collectors.

mod balance;
pub use balance::BalanceCollector;

mod job;
pub use job::PeriodicJob;

use crate::chains::{ChainApi, ChainError};
use alloy::primitives::Address;
use std::{fmt::Debug, future::Future, sync::Arc, time::Duration};

/// Errors returned by metric collectors.
#[derive(Debug, thiserror::Error)]
pub enum MetricCollectorError {
    /// Error coming from RPC.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Trait for a collector that records its own metric.
pub trait MetricCollector: Debug {
    /// Collects metrics and records them.
    fn collect(&self) -> impl Future<Output = Result<(), MetricCollectorError>> + Send;
}

/// Spawns the signer balance collector on its own interval.
pub fn spawn_balance_collector(
    chain: Arc<dyn ChainApi>,
    addresses: Vec<Address>,
    interval: Duration,
) {
    PeriodicJob::new(BalanceCollector::new(chain, addresses), interval).spawn();
}
