//! Transaction store.

mod api;
pub use api::StorageApi;
mod error;
pub use error::StorageError;
mod memory;
pub use memory::InMemoryStorage;
mod pg;
pub use pg::PgStorage;

use crate::transactions::{RefHash, TransactionRecord, TxStatus};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};

/// Transaction store handle.
#[derive(Debug, Clone)]
pub struct RelayStorage {
    inner: Arc<dyn StorageApi>,
}

impl RelayStorage {
    /// Creates a [`RelayStorage`] with an in-memory backend. Used for testing
    /// only.
    pub fn in_memory() -> Self {
        Self { inner: Arc::new(InMemoryStorage::default()) }
    }

    /// Creates a [`RelayStorage`] with a PostgreSQL backend.
    pub fn pg(pool: PgPool) -> Self {
        Self { inner: Arc::new(PgStorage::new(pool)) }
    }

    /// Connects the backend selected by configuration: PostgreSQL when a
    /// database URL is set, in-memory otherwise.
    pub async fn connect(database_url: Option<&str>) -> eyre::Result<Self> {
        Ok(match database_url {
            Some(url) => Self::pg(PgPool::connect(url).await?),
            None => Self::in_memory(),
        })
    }
}

#[async_trait]
impl StorageApi for RelayStorage {
    async fn read_transaction(&self, ref_hash: RefHash) -> api::Result<Option<TransactionRecord>> {
        self.inner.read_transaction(ref_hash).await
    }

    async fn read_transactions_by_status(
        &self,
        statuses: &[TxStatus],
    ) -> api::Result<Vec<TransactionRecord>> {
        self.inner.read_transactions_by_status(statuses).await
    }

    async fn read_by_nonce_excluding_hash(
        &self,
        from: Address,
        nonce: u64,
        excluding: B256,
    ) -> api::Result<Vec<TransactionRecord>> {
        self.inner.read_by_nonce_excluding_hash(from, nonce, excluding).await
    }

    async fn in_flight_counts(&self) -> api::Result<HashMap<Address, usize>> {
        self.inner.in_flight_counts().await
    }

    async fn write_transaction(&self, record: &TransactionRecord) -> api::Result<()> {
        self.inner.write_transaction(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, U256, bytes};

    #[tokio::test]
    async fn connect_without_database_url_falls_back_to_memory() -> eyre::Result<()> {
        let storage = RelayStorage::connect(None).await?;

        let record = TransactionRecord::new(
            RefHash(B256::with_last_byte(1)),
            Address::with_last_byte(0xee),
            bytes!("deadbeef"),
            U256::ZERO,
            1,
        );
        storage.write_transaction(&record).await?;
        assert!(storage.read_transaction(record.ref_hash).await?.is_some());

        Ok(())
    }
}
