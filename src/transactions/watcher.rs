use super::{
    metrics::WatcherMetrics,
    pool::{PoolError, SignerPool},
    signer::BroadcastError,
    transaction::{InvalidTransition, RefHash, TransactionRecord, TxStatus},
};
use crate::{
    chains::{ChainApi, ChainError},
    config::WatcherConfig,
    price::{GasOracle, OracleError},
    storage::{RelayStorage, StorageApi, StorageError},
};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, warn};

/// Errors that may occur within a reconciliation pass.
///
/// None of these escape the watcher: per-record failures are logged and the
/// record is retried on the next tick; a pass-level failure skips the rest of
/// that pass only. Permanent failure is represented exclusively by the
/// terminal record statuses.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// Signing, estimation or submission failed.
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    /// Transient node failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Gas price unavailable.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Signer selection failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A record attempted an illegal lifecycle transition.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// The transaction lifecycle engine.
///
/// Each [`tick`](Self::tick) runs four reconciliation passes in order:
/// broadcast unsubmitted work, sync in-flight status against the node,
/// unstick stalled transactions, and confirm settled ones. Passes pull
/// status-filtered record sets from the store and process each record under
/// its own error boundary.
pub struct TransactionWatcher {
    /// Chain access.
    chain: Arc<dyn ChainApi>,
    /// Underlying store, the single source of truth for record state.
    storage: RelayStorage,
    /// Signing workers.
    pool: Arc<SignerPool>,
    /// Fast gas price source for stuck-transaction replacement.
    oracle: Arc<dyn GasOracle>,
    /// Watcher configuration.
    config: WatcherConfig,
    /// Watcher metrics.
    metrics: WatcherMetrics,
}

impl TransactionWatcher {
    /// Creates a new [`TransactionWatcher`].
    pub fn new(
        chain: Arc<dyn ChainApi>,
        storage: RelayStorage,
        pool: Arc<SignerPool>,
        oracle: Arc<dyn GasOracle>,
        config: WatcherConfig,
    ) -> Self {
        Self { chain, storage, pool, oracle, config, metrics: WatcherMetrics::default() }
    }

    /// Runs the four reconciliation passes once.
    ///
    /// Pass ordering is a correctness requirement: unstick and confirm
    /// consume the statuses sync assigns.
    pub async fn tick(&self) {
        let started = Instant::now();

        if let Err(err) = self.broadcast_pass().await {
            error!(?err, "broadcast pass failed");
        }
        if let Err(err) = self.sync_pass().await {
            error!(?err, "sync pass failed");
        }
        if let Err(err) = self.unstick_pass().await {
            error!(?err, "unstick pass failed");
        }
        if let Err(err) = self.confirm_pass().await {
            error!(?err, "confirm pass failed");
        }

        self.metrics.tick_duration.record(started.elapsed().as_millis() as f64);
    }

    /// Moves a record to `next` and persists it.
    ///
    /// The store is the source of truth: if the record moved since it was
    /// read (e.g. aborted by a rival's collision resolution within the same
    /// pass), the transition is skipped instead of overwriting the newer
    /// state.
    async fn transition(
        &self,
        record: &mut TransactionRecord,
        next: TxStatus,
    ) -> Result<(), WatcherError> {
        if let Some(stored) = self.storage.read_transaction(record.ref_hash).await? {
            if stored.status != record.status {
                debug!(
                    ref_hash = %record.ref_hash,
                    stale = %record.status,
                    current = %stored.status,
                    "skipping transition of stale record"
                );
                return Ok(());
            }
        }

        let prev = record.status;
        record.transition(next)?;
        self.storage.write_transaction(record).await?;

        counter!(
            "watcher_transitions",
            "signer" => record.from.map(|a| a.to_string()).unwrap_or_else(|| "unassigned".into()),
            "status" => next.as_str()
        )
        .increment(1);
        debug!(ref_hash = %record.ref_hash, %prev, %next, "transaction status changed");

        Ok(())
    }

    /// Pass 1: broadcasts every unsubmitted record, cancelling those that
    /// outlived their queue window.
    ///
    /// A failed broadcast leaves the record unsubmitted, so it is retried on
    /// every subsequent tick with no attempt cap.
    async fn broadcast_pass(&self) -> Result<(), WatcherError> {
        let records = self.storage.read_transactions_by_status(&[TxStatus::Unsubmitted]).await?;
        let now = Utc::now();

        for mut record in records {
            if let Err(err) = self.broadcast_one(&mut record, now).await {
                error!(ref_hash = %record.ref_hash, ?err, "failed to broadcast transaction");
            }
        }

        Ok(())
    }

    async fn broadcast_one(
        &self,
        record: &mut TransactionRecord,
        now: DateTime<Utc>,
    ) -> Result<(), WatcherError> {
        if now > record.created_at + self.config.unsubmitted_timeout {
            self.transition(record, TxStatus::Cancelled).await?;
            self.metrics.cancelled.increment(1);
            warn!(ref_hash = %record.ref_hash, "cancelled transaction that was never broadcast");
            return Ok(());
        }

        let signer = self.pool.next_available(&self.storage).await?;
        let broadcast = signer.sign_and_broadcast(record).await?;

        record.tx_hash = Some(broadcast.tx_hash);
        record.nonce = Some(broadcast.nonce);
        record.from = Some(broadcast.from);
        record.expected_at = Some(now + self.config.pending_timeout);
        self.transition(record, TxStatus::Submitted).await?;

        self.metrics.broadcasted.increment(1);
        self.metrics.gas_price.record(record.gas_price as f64);
        histogram!("watcher_gas_price", "signer" => broadcast.from.to_string())
            .record(record.gas_price as f64);
        info!(
            ref_hash = %record.ref_hash,
            tx_hash = %broadcast.tx_hash,
            nonce = broadcast.nonce,
            from = %broadcast.from,
            "broadcast transaction"
        );

        Ok(())
    }

    /// Pass 2: reconciles every in-flight record against the node's view.
    ///
    /// Expiry is measured against the latest block's timestamp rather than
    /// wall-clock time, so a lagging node does not produce false expiries.
    async fn sync_pass(&self) -> Result<(), WatcherError> {
        let records = self.storage.read_transactions_by_status(&TxStatus::IN_FLIGHT).await?;
        if records.is_empty() {
            return Ok(());
        }
        let chain_time = self.chain.latest_block_timestamp().await?;

        for mut record in records {
            if let Err(err) = self.sync_one(&mut record, chain_time).await {
                error!(ref_hash = %record.ref_hash, ?err, "failed to sync transaction");
            }
        }

        Ok(())
    }

    async fn sync_one(
        &self,
        record: &mut TransactionRecord,
        chain_time: u64,
    ) -> Result<(), WatcherError> {
        let Some(tx_hash) = record.tx_hash else { return Ok(()) };
        let expired =
            record.expected_at.is_some_and(|deadline| chain_time as i64 > deadline.timestamp());

        match self.chain.transaction_by_hash(tx_hash).await? {
            Some(view) => match view.block_number {
                Some(block) => {
                    record.block_number = Some(block);
                    self.transition(record, TxStatus::Included).await?;
                    self.resolve_nonce_collisions(record).await?;
                }
                None if expired => {
                    if record.status != TxStatus::Stuck {
                        self.transition(record, TxStatus::Stuck).await?;
                        self.metrics.stuck.increment(1);
                        warn!(ref_hash = %record.ref_hash, tx_hash = %tx_hash, "transaction stuck");
                    }
                }
                None => {
                    if record.status == TxStatus::Submitted {
                        self.transition(record, TxStatus::Mempool).await?;
                    }
                }
            },
            None if expired => {
                self.transition(record, TxStatus::Dropped).await?;
                self.metrics.dropped.increment(1);
                warn!(ref_hash = %record.ref_hash, tx_hash = %tx_hash, "transaction dropped");
            }
            // Still propagating.
            None => {}
        }

        Ok(())
    }

    /// Aborts every record that shares the winner's `(from, nonce)` pair
    /// under a different hash. This is how a replacement transaction retires
    /// its stuck predecessor.
    async fn resolve_nonce_collisions(
        &self,
        winner: &TransactionRecord,
    ) -> Result<(), WatcherError> {
        let (Some(from), Some(nonce), Some(tx_hash)) = (winner.from, winner.nonce, winner.tx_hash)
        else {
            return Ok(());
        };

        for mut rival in self.storage.read_by_nonce_excluding_hash(from, nonce, tx_hash).await? {
            if rival.status.is_terminal() {
                continue;
            }
            self.transition(&mut rival, TxStatus::Aborted).await?;
            self.metrics.aborted.increment(1);
            info!(
                ref_hash = %rival.ref_hash,
                winner = %winner.ref_hash,
                %from,
                nonce,
                "aborted transaction that lost its nonce"
            );
        }

        Ok(())
    }

    /// Pass 3: replaces every stuck transaction whose nonce can be bought
    /// back at a higher gas price.
    ///
    /// An oracle failure aborts this pass for the current tick only.
    async fn unstick_pass(&self) -> Result<(), WatcherError> {
        let records = self.storage.read_transactions_by_status(&[TxStatus::Stuck]).await?;
        if records.is_empty() {
            return Ok(());
        }

        let fast = self.oracle.fast_gas_price().await?;
        let target = fast.saturating_mul(self.config.gas_escalation_percent as u128) / 100;

        for record in records {
            if let Err(err) = self.unstick_one(&record, target).await {
                error!(ref_hash = %record.ref_hash, ?err, "failed to unstick transaction");
            }
        }

        Ok(())
    }

    async fn unstick_one(
        &self,
        record: &TransactionRecord,
        target_gas_price: u128,
    ) -> Result<(), WatcherError> {
        // No point re-submitting at the same or lower price.
        if target_gas_price <= record.gas_price {
            return Ok(());
        }
        let (Some(from), Some(nonce)) = (record.from, record.nonce) else { return Ok(()) };

        // A replacement at this target price may already exist from an
        // earlier tick.
        let ref_hash = RefHash::derived(record.ref_hash, nonce, target_gas_price);
        if self.storage.read_transaction(ref_hash).await?.is_some() {
            return Ok(());
        }

        let signer = self.pool.get(&from).ok_or(PoolError::NoSignerAvailable)?;
        let tx_hash = signer.send_self_transfer_with_nonce(nonce, target_gas_price).await?;

        // The stuck record is left as-is: once either transaction lands, the
        // sync pass aborts the loser.
        let now = Utc::now();
        let replacement = TransactionRecord {
            ref_hash,
            to: from,
            payload: Default::default(),
            protocol_fee: Default::default(),
            gas_price: target_gas_price,
            status: TxStatus::Submitted,
            tx_hash: Some(tx_hash),
            nonce: Some(nonce),
            from: Some(from),
            block_number: None,
            created_at: now,
            expected_at: Some(now + self.config.pending_timeout),
        };
        self.storage.write_transaction(&replacement).await?;

        self.metrics.unstuck.increment(1);
        counter!(
            "watcher_transitions",
            "signer" => from.to_string(),
            "status" => TxStatus::Submitted.as_str()
        )
        .increment(1);
        info!(
            ref_hash = %record.ref_hash,
            replacement = %replacement.ref_hash,
            tx_hash = %tx_hash,
            nonce,
            gas_price = target_gas_price,
            "replaced stuck transaction"
        );

        Ok(())
    }

    /// Pass 4: finalizes included transactions once they are buried deep
    /// enough, and returns reorged ones to being watched.
    async fn confirm_pass(&self) -> Result<(), WatcherError> {
        let records = self.storage.read_transactions_by_status(&[TxStatus::Included]).await?;
        if records.is_empty() {
            return Ok(());
        }
        let head = self.chain.block_number().await?;

        for mut record in records {
            if let Err(err) = self.confirm_one(&mut record, head).await {
                error!(ref_hash = %record.ref_hash, ?err, "failed to confirm transaction");
            }
        }

        Ok(())
    }

    async fn confirm_one(
        &self,
        record: &mut TransactionRecord,
        head: u64,
    ) -> Result<(), WatcherError> {
        let Some(tx_hash) = record.tx_hash else { return Ok(()) };

        match self.chain.transaction_by_hash(tx_hash).await? {
            // A reorg ejected the transaction entirely; resume watching.
            None => {
                record.block_number = None;
                self.transition(record, TxStatus::Submitted).await?;
                warn!(ref_hash = %record.ref_hash, tx_hash = %tx_hash, "reorg ejected transaction");
            }
            Some(view) => match view.block_number {
                // A reorg returned the transaction to the pending pool.
                None => {
                    record.block_number = None;
                    self.transition(record, TxStatus::Mempool).await?;
                    warn!(
                        ref_hash = %record.ref_hash,
                        tx_hash = %tx_hash,
                        "reorg returned transaction to mempool"
                    );
                }
                Some(block) => {
                    let moved = record.block_number != Some(block);
                    record.block_number = Some(block);

                    if head >= block + self.config.confirmation_depth {
                        self.transition(record, TxStatus::Confirmed).await?;
                        self.metrics.confirmed.increment(1);
                        info!(
                            ref_hash = %record.ref_hash,
                            tx_hash = %tx_hash,
                            block,
                            "transaction confirmed"
                        );
                    } else if moved {
                        // Still within the reorg-risk window; only the
                        // refreshed inclusion block is persisted.
                        self.storage.write_transaction(record).await?;
                    }
                }
            },
        }

        Ok(())
    }
}
