use super::signer::Signer;
use crate::storage::{RelayStorage, StorageApi, StorageError};
use alloy::primitives::Address;
use rand::seq::IndexedRandom;
use std::{collections::HashMap, sync::Arc};

/// Errors that may occur while selecting a signer.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool is empty or the selected address is not in the pool.
    #[error("no signer available")]
    NoSignerAvailable,

    /// Storage error while reading in-flight counts.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Immutable registry of signing workers, built once at startup and shared
/// read-only by the watcher and the balance collector.
#[derive(Debug)]
pub struct SignerPool {
    signers: HashMap<Address, Arc<Signer>>,
}

impl SignerPool {
    /// Creates a new [`SignerPool`].
    pub fn new(signers: impl IntoIterator<Item = Signer>) -> Self {
        Self {
            signers: signers
                .into_iter()
                .map(|signer| (signer.address(), Arc::new(signer)))
                .collect(),
        }
    }

    /// Returns the signer owning the given address.
    pub fn get(&self, address: &Address) -> Option<Arc<Signer>> {
        self.signers.get(address).cloned()
    }

    /// Returns the addresses in the pool.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.signers.keys()
    }

    /// Returns the least-loaded signer.
    ///
    /// Load is the number of in-flight records grouped by signer address;
    /// signers with no in-flight records win. Ties are broken randomly so no
    /// single signer's nonce queue grows deeper than the rest, which bounds
    /// the blast radius of one stuck transaction.
    pub async fn next_available(&self, storage: &RelayStorage) -> Result<Arc<Signer>, PoolError> {
        let counts = storage.in_flight_counts().await?;
        let load = |address: &Address| counts.get(address).copied().unwrap_or(0);

        let min = self
            .signers
            .keys()
            .map(load)
            .min()
            .ok_or(PoolError::NoSignerAvailable)?;
        let candidates: Vec<&Address> =
            self.signers.keys().filter(|address| load(address) == min).collect();

        candidates
            .choose(&mut rand::rng())
            .and_then(|address| self.signers.get(*address).cloned())
            .ok_or(PoolError::NoSignerAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chains::{ChainApi, ChainError},
        signers::DynSigner,
        transactions::{RefHash, TransactionRecord, TxStatus},
    };
    use alloy::{
        primitives::{B256, Bytes, U256},
        rpc::types::TransactionRequest,
    };
    use async_trait::async_trait;

    #[derive(Debug, Default)]
    struct NoopChain;

    #[async_trait]
    impl ChainApi for NoopChain {
        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(1)
        }
        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn latest_block_timestamp(&self) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn transaction_by_hash(
            &self,
            _hash: B256,
        ) -> Result<Option<crate::chains::TxView>, ChainError> {
            Ok(None)
        }
        async fn balance(&self, _address: Address) -> Result<U256, ChainError> {
            Ok(U256::ZERO)
        }
        async fn estimate_gas(&self, _request: TransactionRequest) -> Result<u64, ChainError> {
            Ok(21_000)
        }
        async fn gas_price(&self) -> Result<u128, ChainError> {
            Ok(0)
        }
        async fn pending_nonce(&self, _address: Address) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn send_raw_transaction(&self, _encoded: &[u8]) -> Result<B256, ChainError> {
            Ok(B256::ZERO)
        }
    }

    fn pool_of(n: usize) -> SignerPool {
        let chain = Arc::new(NoopChain);
        SignerPool::new(
            (0..n).map(|_| Signer::new(chain.clone(), DynSigner::random(), 1, 120)),
        )
    }

    async fn in_flight_record(storage: &RelayStorage, id: u8, from: Address) {
        let mut record = TransactionRecord::new(
            RefHash(B256::with_last_byte(id)),
            Address::with_last_byte(0xee),
            Bytes::new(),
            U256::ZERO,
            1,
        );
        record.status = TxStatus::Submitted;
        record.from = Some(from);
        record.nonce = Some(id as u64);
        record.tx_hash = Some(B256::with_last_byte(id));
        storage.write_transaction(&record).await.unwrap();
    }

    #[tokio::test]
    async fn empty_pool_has_no_signer() {
        let storage = RelayStorage::in_memory();
        let err = pool_of(0).next_available(&storage).await.unwrap_err();
        assert!(matches!(err, PoolError::NoSignerAvailable));
    }

    #[tokio::test]
    async fn idle_signer_is_preferred() {
        let storage = RelayStorage::in_memory();
        let pool = pool_of(2);

        let mut addresses = pool.addresses().copied().collect::<Vec<_>>();
        addresses.sort();
        let (busy, idle) = (addresses[0], addresses[1]);

        in_flight_record(&storage, 1, busy).await;
        in_flight_record(&storage, 2, busy).await;

        for _ in 0..8 {
            let selected = pool.next_available(&storage).await.unwrap();
            assert_eq!(selected.address(), idle);
        }
    }

    #[tokio::test]
    async fn records_of_foreign_signers_are_ignored() {
        let storage = RelayStorage::in_memory();
        let pool = pool_of(1);
        let ours = *pool.addresses().next().unwrap();

        in_flight_record(&storage, 1, Address::with_last_byte(0x99)).await;

        let selected = pool.next_available(&storage).await.unwrap();
        assert_eq!(selected.address(), ours);
    }
}
