//! Watcher constants.

use std::time::Duration;

/// Default interval between watcher ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Default interval between signer balance samples.
pub const DEFAULT_BALANCE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Default window after which a never-broadcast transaction is cancelled.
pub const DEFAULT_UNSUBMITTED_TIMEOUT: Duration = Duration::from_secs(180);

/// Default window a broadcast transaction is given to be mined before it is
/// considered stuck or dropped.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(120);

/// Default TTL for cached fast gas price observations.
pub const DEFAULT_GAS_PRICE_TTL: Duration = Duration::from_secs(10);

/// Default number of blocks a transaction must be buried under before it is
/// considered final.
pub const DEFAULT_CONFIRMATION_DEPTH: u64 = 5;

/// Multiplier applied to the oracle's fast gas price when replacing a stuck
/// transaction, in percent.
pub const DEFAULT_GAS_ESCALATION_PERCENT: u64 = 120;

/// Buffer applied to gas estimates to cover execution overhead, in percent.
pub const DEFAULT_GAS_ESTIMATE_PERCENT: u64 = 120;

/// Gas limit of the zero-value self-transfer used to reuse a stuck nonce.
pub const SELF_TRANSFER_GAS_LIMIT: u64 = 21_000;
