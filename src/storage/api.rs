//! Transaction store api.

use super::StorageError;
use crate::transactions::{RefHash, TransactionRecord, TxStatus};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::{collections::HashMap, fmt::Debug};

/// Type alias for `Result<T, StorageError>`.
pub type Result<T> = core::result::Result<T, StorageError>;

/// Transaction store API.
///
/// The store is the single source of truth: every state transition is a read
/// of a record followed by a write of the same record. Callers must not cache
/// records across ticks. Records are never deleted; terminal records are
/// retained for audit and nonce-collision checks.
#[async_trait]
pub trait StorageApi: Debug + Send + Sync {
    /// Reads a transaction record by its reference hash.
    async fn read_transaction(&self, ref_hash: RefHash) -> Result<Option<TransactionRecord>>;

    /// Reads all transaction records in any of the given statuses.
    async fn read_transactions_by_status(
        &self,
        statuses: &[TxStatus],
    ) -> Result<Vec<TransactionRecord>>;

    /// Reads all records holding the given `(from, nonce)` pair whose active
    /// transaction hash differs from `excluding`.
    async fn read_by_nonce_excluding_hash(
        &self,
        from: Address,
        nonce: u64,
        excluding: B256,
    ) -> Result<Vec<TransactionRecord>>;

    /// Returns the number of in-flight records grouped by signer address.
    async fn in_flight_counts(&self) -> Result<HashMap<Address, usize>>;

    /// Inserts or updates a transaction record, keyed by its reference hash.
    async fn write_transaction(&self, record: &TransactionRecord) -> Result<()>;
}
