//! Transaction store implementation in-memory. For testing only.

use super::{StorageApi, api::Result};
use crate::transactions::{RefHash, TransactionRecord, TxStatus};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

/// [`StorageApi`] implementation in-memory. Used for testing.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    transactions: DashMap<RefHash, TransactionRecord>,
}

#[async_trait]
impl StorageApi for InMemoryStorage {
    async fn read_transaction(&self, ref_hash: RefHash) -> Result<Option<TransactionRecord>> {
        Ok(self.transactions.get(&ref_hash).map(|record| record.clone()))
    }

    async fn read_transactions_by_status(
        &self,
        statuses: &[TxStatus],
    ) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .transactions
            .iter()
            .filter(|record| statuses.contains(&record.status))
            .map(|record| record.clone())
            .collect())
    }

    async fn read_by_nonce_excluding_hash(
        &self,
        from: Address,
        nonce: u64,
        excluding: B256,
    ) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .transactions
            .iter()
            .filter(|record| {
                record.from == Some(from)
                    && record.nonce == Some(nonce)
                    && record.tx_hash.is_some_and(|hash| hash != excluding)
            })
            .map(|record| record.clone())
            .collect())
    }

    async fn in_flight_counts(&self) -> Result<HashMap<Address, usize>> {
        let mut counts = HashMap::new();
        for record in self.transactions.iter() {
            if let Some(from) = record.from {
                if record.status.is_in_flight() {
                    *counts.entry(from).or_default() += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn write_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.transactions.insert(record.ref_hash, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, U256, bytes};

    fn record(id: u8, status: TxStatus) -> TransactionRecord {
        let mut record = TransactionRecord::new(
            RefHash(B256::with_last_byte(id)),
            Address::with_last_byte(0xee),
            bytes!("deadbeef"),
            U256::ZERO,
            20_000_000_000,
        );
        record.status = status;
        record
    }

    #[tokio::test]
    async fn status_queries_and_counts() -> eyre::Result<()> {
        let storage = InMemoryStorage::default();
        let signer = Address::with_last_byte(0xaa);

        let mut submitted = record(1, TxStatus::Submitted);
        submitted.from = Some(signer);
        submitted.nonce = Some(7);
        submitted.tx_hash = Some(B256::with_last_byte(0x01));
        storage.write_transaction(&submitted).await?;
        storage.write_transaction(&record(2, TxStatus::Unsubmitted)).await?;

        assert_eq!(
            storage.read_transactions_by_status(&[TxStatus::Submitted]).await?.len(),
            1
        );
        assert_eq!(storage.in_flight_counts().await?.get(&signer), Some(&1));

        Ok(())
    }

    #[tokio::test]
    async fn nonce_query_excludes_own_hash() -> eyre::Result<()> {
        let storage = InMemoryStorage::default();
        let signer = Address::with_last_byte(0xaa);

        for (id, hash) in [(1u8, 0x01u8), (2, 0x02)] {
            let mut rival = record(id, TxStatus::Submitted);
            rival.from = Some(signer);
            rival.nonce = Some(7);
            rival.tx_hash = Some(B256::with_last_byte(hash));
            storage.write_transaction(&rival).await?;
        }

        let rivals = storage
            .read_by_nonce_excluding_hash(signer, 7, B256::with_last_byte(0x01))
            .await?;
        assert_eq!(rivals.len(), 1);
        assert_eq!(rivals[0].tx_hash, Some(B256::with_last_byte(0x02)));

        Ok(())
    }

    #[tokio::test]
    async fn write_is_an_upsert() -> eyre::Result<()> {
        let storage = InMemoryStorage::default();

        let mut record = record(1, TxStatus::Unsubmitted);
        storage.write_transaction(&record).await?;
        record.status = TxStatus::Cancelled;
        storage.write_transaction(&record).await?;

        let stored = storage.read_transaction(record.ref_hash).await?.unwrap();
        assert_eq!(stored.status, TxStatus::Cancelled);

        Ok(())
    }
}
