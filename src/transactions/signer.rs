use super::transaction::TransactionRecord;
use crate::{
    chains::{ChainApi, ChainError},
    constants::SELF_TRANSFER_GAS_LIMIT,
    signers::DynSigner,
};
use alloy::{
    consensus::{TxLegacy, TypedTransaction},
    eips::Encodable2718,
    network::{Ethereum, EthereumWallet, NetworkWallet},
    primitives::{Address, B256, U256},
    rpc::types::TransactionRequest,
};
use std::sync::Arc;

/// Errors that may occur while signing and broadcasting a transaction.
///
/// The caller must not assume partial success: a failed broadcast leaves the
/// record untouched and it is retried on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// Gas estimation failed.
    #[error("gas estimation failed: {0}")]
    Estimate(#[source] ChainError),

    /// Error occurred while signing the transaction.
    #[error(transparent)]
    Sign(#[from] alloy::signers::Error),

    /// RPC error.
    #[error(transparent)]
    Rpc(#[from] ChainError),
}

/// Outcome of a successful broadcast.
#[derive(Debug, Clone, Copy)]
pub struct Broadcast {
    /// Hash of the broadcast transaction.
    pub tx_hash: B256,
    /// Nonce assigned to the transaction.
    pub nonce: u64,
    /// Address the transaction was sent from.
    pub from: Address,
    /// Gas usage estimate the gas limit was derived from.
    pub gas_used_estimate: u64,
}

/// A signing worker wrapping one externally-owned account.
///
/// Produces signed, broadcast-ready transactions for queued meta-transaction
/// payloads, and raw self-transfers used to reuse a stuck nonce.
#[derive(Debug)]
pub struct Signer {
    /// Chain access used for nonce lookups, estimation and broadcasting.
    chain: Arc<dyn ChainApi>,
    /// Inner [`EthereumWallet`] used to sign transactions.
    wallet: EthereumWallet,
    /// Address of the wallet.
    address: Address,
    /// Chain id signed into every transaction.
    chain_id: u64,
    /// Buffer applied to gas estimates, in percent.
    gas_estimate_percent: u64,
}

impl Signer {
    /// Creates a new [`Signer`].
    pub fn new(
        chain: Arc<dyn ChainApi>,
        signer: DynSigner,
        chain_id: u64,
        gas_estimate_percent: u64,
    ) -> Self {
        let address = signer.address();
        Self { chain, wallet: EthereumWallet::new(signer.0), address, chain_id, gas_estimate_percent }
    }

    /// Returns the signer address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a meta-transaction payload and broadcasts it.
    ///
    /// Fetches the account's pending nonce, estimates gas for the call with a
    /// safety buffer, signs and submits the raw transaction.
    pub async fn sign_and_broadcast(
        &self,
        record: &TransactionRecord,
    ) -> Result<Broadcast, BroadcastError> {
        let nonce = self.chain.pending_nonce(self.address).await?;

        let request = TransactionRequest {
            from: Some(self.address),
            to: Some(record.to.into()),
            value: Some(record.protocol_fee),
            input: record.payload.clone().into(),
            ..Default::default()
        };
        let gas_used_estimate =
            self.chain.estimate_gas(request).await.map_err(BroadcastError::Estimate)?;

        let tx = TypedTransaction::Legacy(TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: record.gas_price,
            gas_limit: gas_used_estimate * self.gas_estimate_percent / 100,
            to: record.to.into(),
            value: record.protocol_fee,
            input: record.payload.clone(),
        });

        let tx_hash = self.sign_and_send(tx).await?;
        Ok(Broadcast { tx_hash, nonce, from: self.address, gas_used_estimate })
    }

    /// Broadcasts a zero-value self-transfer with an explicit nonce.
    ///
    /// The explicit nonce bypasses the pending-nonce lookup: the stuck slot
    /// must be reused, not incremented past.
    pub async fn send_self_transfer_with_nonce(
        &self,
        nonce: u64,
        gas_price: u128,
    ) -> Result<B256, BroadcastError> {
        let tx = TypedTransaction::Legacy(TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit: SELF_TRANSFER_GAS_LIMIT,
            to: self.address.into(),
            value: U256::ZERO,
            ..Default::default()
        });

        self.sign_and_send(tx).await
    }

    /// Signs a transaction and submits it raw.
    async fn sign_and_send(&self, tx: TypedTransaction) -> Result<B256, BroadcastError> {
        let signed =
            NetworkWallet::<Ethereum>::sign_transaction_from(&self.wallet, self.address, tx)
                .await?;

        Ok(self.chain.send_raw_transaction(&signed.encoded_2718()).await?)
    }
}
