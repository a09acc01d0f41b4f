use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// Metrics for a [`TransactionWatcher`](crate::transactions::TransactionWatcher).
#[derive(Metrics)]
#[metrics(scope = "watcher")]
pub struct WatcherMetrics {
    /// Number of transactions broadcast.
    pub broadcasted: Counter,
    /// Number of transactions cancelled before broadcast.
    pub cancelled: Counter,
    /// Number of transactions marked stuck.
    pub stuck: Counter,
    /// Number of transactions dropped by the network.
    pub dropped: Counter,
    /// Number of confirmed transactions.
    pub confirmed: Counter,
    /// Number of transactions aborted after losing their nonce.
    pub aborted: Counter,
    /// Number of replacement transactions sent for stuck nonces.
    pub unstuck: Counter,
    /// Gas prices of broadcast transactions, in wei.
    pub gas_price: Histogram,
    /// Duration of a full watcher tick, in milliseconds.
    pub tick_duration: Histogram,
}
