//! # Meta-transaction Relay Watcher
//!
//! Signs and broadcasts queued meta-transactions from a pool of funded
//! accounts, tracks them through the mempool and block inclusion, replaces
//! stuck transactions at a higher gas price, and reconciles local state
//! against the (eventually consistent) view of a blockchain node.

pub mod chains;
pub mod config;
pub mod constants;
pub mod metrics;
pub mod price;
pub mod serde;
pub mod signers;
pub mod storage;
pub mod transactions;
