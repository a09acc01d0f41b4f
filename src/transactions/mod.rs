//! Transaction lifecycle engine and signing workers.

mod metrics;
pub use metrics::WatcherMetrics;
mod pool;
pub use pool::{PoolError, SignerPool};
mod service;
pub use service::{WatcherService, WatcherServiceHandle};
mod signer;
pub use signer::{Broadcast, BroadcastError, Signer};
mod transaction;
pub use transaction::{InvalidTransition, RefHash, TransactionRecord, TxStatus};
mod watcher;
pub use watcher::{TransactionWatcher, WatcherError};
