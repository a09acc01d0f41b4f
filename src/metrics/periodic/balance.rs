use super::{MetricCollector, MetricCollectorError};
use crate::chains::ChainApi;
use alloy::primitives::{Address, utils::format_units};
use metrics::gauge;
use std::{fmt::Debug, sync::Arc};
use tracing::warn;

/// Samples the native-token balance of every pool signer and republishes it
/// as a gauge keyed by address.
///
/// Purely observational; failures never affect the lifecycle engine.
pub struct BalanceCollector {
    /// Chain access.
    chain: Arc<dyn ChainApi>,
    /// Addresses to be queried.
    addresses: Vec<Address>,
}

impl BalanceCollector {
    /// Creates a new [`BalanceCollector`].
    pub fn new(chain: Arc<dyn ChainApi>, addresses: Vec<Address>) -> Self {
        Self { chain, addresses }
    }
}

impl MetricCollector for BalanceCollector {
    async fn collect(&self) -> Result<(), MetricCollectorError> {
        for address in &self.addresses {
            let balance = self.chain.balance(*address).await?;

            match format_units(balance, 18).map(|eth| eth.parse::<f64>()) {
                Ok(Ok(eth)) => {
                    gauge!("signer_balance", "address" => address.to_string()).set(eth)
                }
                _ => warn!(target: "metrics::periodic", %address, "failed to format balance"),
            }
        }
        Ok(())
    }
}

impl Debug for BalanceCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceCollector").field("addresses", &self.addresses).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{ChainError, TxView};
    use alloy::{
        primitives::{B256, U256},
        rpc::types::TransactionRequest,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Default)]
    struct BalanceChain {
        queries: AtomicU64,
    }

    #[async_trait]
    impl ChainApi for BalanceChain {
        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(1)
        }
        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn latest_block_timestamp(&self) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn transaction_by_hash(&self, _hash: B256) -> Result<Option<TxView>, ChainError> {
            Ok(None)
        }
        async fn balance(&self, _address: Address) -> Result<U256, ChainError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(U256::from(1u64))
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

    #[tokio::test]
    async fn samples_every_pool_address() {
        let chain = Arc::new(BalanceChain::default());
        let addresses = vec![Address::with_last_byte(1), Address::with_last_byte(2)];

        BalanceCollector::new(chain.clone(), addresses).collect().await.unwrap();

        assert_eq!(chain.queries.load(Ordering::SeqCst), 2);
    }
}
