//! Relay watcher configuration.

use crate::constants::{
    DEFAULT_BALANCE_CHECK_INTERVAL, DEFAULT_CONFIRMATION_DEPTH, DEFAULT_GAS_ESCALATION_PERCENT,
    DEFAULT_GAS_ESTIMATE_PERCENT, DEFAULT_PENDING_TIMEOUT, DEFAULT_TICK_INTERVAL,
    DEFAULT_UNSUBMITTED_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// RPC endpoint of the node used for broadcasting and watching
    /// transactions.
    pub rpc_endpoint: Url,
    /// Watcher configuration.
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Private keys of the signer pool, hex-encoded.
    #[serde(skip_serializing, default)]
    pub signer_keys: Vec<String>,
    /// Database URL. When unset, the in-memory backend is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl RelayConfig {
    /// Sets the watcher configuration.
    pub fn with_watcher_config(mut self, config: WatcherConfig) -> Self {
        self.watcher = config;
        self
    }

    /// Sets the signer pool keys.
    pub fn with_signer_keys(mut self, keys: Vec<String>) -> Self {
        self.signer_keys = keys;
        self
    }

    /// Sets the database URL.
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        self.database_url = url;
        self
    }
}

/// Configuration of the transaction watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Interval between watcher ticks.
    #[serde(with = "crate::serde::duration")]
    pub tick_interval: Duration,
    /// Interval between signer balance samples.
    #[serde(with = "crate::serde::duration")]
    pub balance_check_interval: Duration,
    /// Window after which a never-broadcast transaction is cancelled.
    #[serde(with = "crate::serde::duration")]
    pub unsubmitted_timeout: Duration,
    /// Window a broadcast transaction is given to be mined, measured in chain
    /// time from the moment of broadcast.
    #[serde(with = "crate::serde::duration")]
    pub pending_timeout: Duration,
    /// Number of blocks a transaction must be buried under before it is
    /// considered final.
    pub confirmation_depth: u64,
    /// Multiplier applied to the fast gas price when replacing a stuck
    /// transaction, in percent.
    pub gas_escalation_percent: u64,
    /// Buffer applied to gas estimates, in percent.
    pub gas_estimate_percent: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            balance_check_interval: DEFAULT_BALANCE_CHECK_INTERVAL,
            unsubmitted_timeout: DEFAULT_UNSUBMITTED_TIMEOUT,
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
            confirmation_depth: DEFAULT_CONFIRMATION_DEPTH,
            gas_escalation_percent: DEFAULT_GAS_ESCALATION_PERCENT,
            gas_estimate_percent: DEFAULT_GAS_ESTIMATE_PERCENT,
        }
    }
}
