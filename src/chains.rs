//! Blockchain RPC boundary.
//!
//! The watcher only ever talks to the chain through [`ChainApi`], which keeps
//! the node a black box capable of broadcasting raw transactions, reading
//! transaction and block data, and estimating gas.

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider},
    rpc::types::TransactionRequest,
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use std::fmt::Debug;

/// Errors returned by the chain boundary.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),

    /// The node did not return a latest block.
    #[error("latest block not available")]
    NoLatestBlock,

    /// Other errors.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Type alias for `Result<T, ChainError>`.
pub type Result<T> = core::result::Result<T, ChainError>;

/// Minimal view of an on-chain transaction, as reported by the node.
#[derive(Debug, Clone, Copy)]
pub struct TxView {
    /// Transaction hash.
    pub hash: B256,
    /// Block the transaction was included in, if any.
    pub block_number: Option<u64>,
}

/// Chain access used by the watcher, the signers and the balance collector.
#[async_trait]
pub trait ChainApi: Debug + Send + Sync {
    /// Returns the chain id.
    async fn chain_id(&self) -> Result<u64>;

    /// Returns the number of the latest block.
    async fn block_number(&self) -> Result<u64>;

    /// Returns the timestamp of the latest block, in seconds.
    ///
    /// Timeout windows are measured against chain time rather than wall-clock
    /// time so that a lagging node does not produce false expiries.
    async fn latest_block_timestamp(&self) -> Result<u64>;

    /// Looks up a transaction by hash.
    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TxView>>;

    /// Returns the native-token balance of an account.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// Estimates the gas usage of a call.
    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64>;

    /// Returns the node's current gas price, in wei.
    async fn gas_price(&self) -> Result<u128>;

    /// Returns the pending-nonce of an account.
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    /// Broadcasts a raw, signed transaction and returns its hash.
    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256>;
}

#[async_trait]
impl ChainApi for DynProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.get_block_number().await?)
    }

    async fn latest_block_timestamp(&self) -> Result<u64> {
        let block = self.get_block(BlockId::latest()).await?.ok_or(ChainError::NoLatestBlock)?;
        Ok(block.header.timestamp)
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TxView>> {
        Ok(self
            .get_transaction_by_hash(hash)
            .await?
            .map(|tx| TxView { hash, block_number: tx.block_number }))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.get_balance(address).await?)
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        Ok(Provider::estimate_gas(self, request).await?)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.get_gas_price().await?)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        Ok(self.get_transaction_count(address).pending().await?)
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256> {
        Ok(*Provider::send_raw_transaction(self, encoded).await?.tx_hash())
    }
}
