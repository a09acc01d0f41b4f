use alloy::primitives::{Address, B256, Bytes, U256, keccak256, wrap_fixed_bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

wrap_fixed_bytes! {
    /// Idempotency key of a transaction record, supplied by the enqueuing
    /// layer.
    ///
    /// Identifies the logical request independently of how many on-chain
    /// transactions attempt to fulfill it. Note: this is different from the
    /// transaction hash, as the hash corresponding to a reference can change
    /// when a stuck transaction is replaced.
    pub struct RefHash<32>;
}

impl RefHash {
    /// Derives the reference hash of a replacement record from its parent.
    ///
    /// Deterministic so that a retried unstick attempt at the same target
    /// price maps to the same record.
    pub fn derived(parent: RefHash, nonce: u64, gas_price: u128) -> Self {
        let mut seed = Vec::with_capacity(56);
        seed.extend_from_slice(parent.as_slice());
        seed.extend_from_slice(&nonce.to_be_bytes());
        seed.extend_from_slice(&gas_price.to_be_bytes());
        Self(keccak256(&seed))
    }
}

/// Status of a transaction record.
///
/// A closed set: transitions are validated by
/// [`TransactionRecord::transition`] and only move along the graph below.
///
/// ```text
/// Unsubmitted → Submitted | Cancelled
/// Submitted   → Mempool | Included | Stuck | Dropped | Aborted
/// Mempool     → Included | Stuck | Dropped | Aborted
/// Stuck       → Included | Dropped | Aborted
/// Included    → Confirmed | Aborted | Submitted | Mempool
/// ```
///
/// The two regressions out of `Included` are reorg handling: a block that
/// ejected the transaction returns it to being watched. `Confirmed`,
/// `Cancelled`, `Dropped` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Created by the enqueuing layer, not yet broadcast.
    Unsubmitted,
    /// Broadcast to the node, not yet seen in its mempool.
    Submitted,
    /// Visible in the node's mempool.
    Mempool,
    /// Broadcast but not mined within its expected window.
    Stuck,
    /// Observed included in a block.
    Included,
    /// Buried under enough blocks to be final.
    Confirmed,
    /// Expired before it was ever broadcast.
    Cancelled,
    /// No longer visible on-chain after its expected window.
    Dropped,
    /// Lost its nonce to a competing transaction.
    Aborted,
}

impl TxStatus {
    /// The statuses that occupy a signer's nonce queue.
    pub const IN_FLIGHT: [TxStatus; 3] = [Self::Submitted, Self::Mempool, Self::Stuck];

    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled | Self::Dropped | Self::Aborted)
    }

    /// Whether the status counts towards a signer's in-flight load.
    pub fn is_in_flight(&self) -> bool {
        Self::IN_FLIGHT.contains(self)
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        match self {
            Self::Unsubmitted => matches!(next, Self::Submitted | Self::Cancelled),
            Self::Submitted => matches!(
                next,
                Self::Mempool | Self::Included | Self::Stuck | Self::Dropped | Self::Aborted
            ),
            Self::Mempool => {
                matches!(next, Self::Included | Self::Stuck | Self::Dropped | Self::Aborted)
            }
            Self::Stuck => matches!(next, Self::Included | Self::Dropped | Self::Aborted),
            Self::Included => {
                matches!(next, Self::Confirmed | Self::Aborted | Self::Submitted | Self::Mempool)
            }
            Self::Confirmed | Self::Cancelled | Self::Dropped | Self::Aborted => false,
        }
    }

    /// Returns the status as a string, as persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsubmitted => "unsubmitted",
            Self::Submitted => "submitted",
            Self::Mempool => "mempool",
            Self::Stuck => "stuck",
            Self::Included => "included",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Dropped => "dropped",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status transition violates the lifecycle graph.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("illegal status transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// Current status.
    pub from: TxStatus,
    /// Rejected next status.
    pub to: TxStatus,
}

/// The unit of work of the watcher and its durable state.
///
/// Created by the enqueuing layer in [`TxStatus::Unsubmitted`] status and
/// mutated exclusively by the watcher afterwards. `tx_hash` and `nonce` are
/// assigned once at broadcast time and never rewritten; replacing a stuck
/// transaction creates a new record instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Idempotency key of the logical request.
    pub ref_hash: RefHash,
    /// Execution target of the payload.
    pub to: Address,
    /// Opaque signed meta-transaction calldata.
    pub payload: Bytes,
    /// Native value forwarded with the call.
    pub protocol_fee: U256,
    /// Gas price of the current attempt, in wei.
    pub gas_price: u128,
    /// Lifecycle status.
    pub status: TxStatus,
    /// Hash of the currently-active broadcast transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    /// Account nonce used for this attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Signer address owning this transaction's nonce sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Block in which the transaction was observed included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Time the record was created by the enqueuing layer.
    pub created_at: DateTime<Utc>,
    /// Chain-time deadline for the transaction to be mined, set at broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// Creates a new record in [`TxStatus::Unsubmitted`] status.
    pub fn new(
        ref_hash: RefHash,
        to: Address,
        payload: Bytes,
        protocol_fee: U256,
        gas_price: u128,
    ) -> Self {
        Self {
            ref_hash,
            to,
            payload,
            protocol_fee,
            gas_price,
            status: TxStatus::Unsubmitted,
            tx_hash: None,
            nonce: None,
            from: None,
            block_number: None,
            created_at: Utc::now(),
            expected_at: None,
        }
    }

    /// Moves the record to `next`, rejecting transitions outside the
    /// lifecycle graph.
    pub fn transition(&mut self, next: TxStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::bytes;

    fn record() -> TransactionRecord {
        TransactionRecord::new(
            RefHash(B256::with_last_byte(1)),
            Address::with_last_byte(0xee),
            bytes!("deadbeef"),
            U256::ZERO,
            20_000_000_000,
        )
    }

    #[test]
    fn happy_path_is_legal() {
        let mut record = record();
        for next in
            [TxStatus::Submitted, TxStatus::Mempool, TxStatus::Included, TxStatus::Confirmed]
        {
            record.transition(next).unwrap();
        }
        assert!(record.status.is_terminal());
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut record = record();
        let err = record.transition(TxStatus::Confirmed).unwrap_err();
        assert_eq!(err.from, TxStatus::Unsubmitted);
        assert_eq!(record.status, TxStatus::Unsubmitted);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in
            [TxStatus::Confirmed, TxStatus::Cancelled, TxStatus::Dropped, TxStatus::Aborted]
        {
            for next in [
                TxStatus::Unsubmitted,
                TxStatus::Submitted,
                TxStatus::Mempool,
                TxStatus::Stuck,
                TxStatus::Included,
                TxStatus::Confirmed,
                TxStatus::Cancelled,
                TxStatus::Dropped,
                TxStatus::Aborted,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next} must be illegal");
            }
        }
    }

    #[test]
    fn reorg_regressions_are_legal() {
        assert!(TxStatus::Included.can_transition_to(TxStatus::Submitted));
        assert!(TxStatus::Included.can_transition_to(TxStatus::Mempool));
        assert!(!TxStatus::Mempool.can_transition_to(TxStatus::Submitted));
    }

    #[test]
    fn derived_ref_hash_is_stable_and_distinct() {
        let parent = RefHash(B256::with_last_byte(7));
        assert_eq!(RefHash::derived(parent, 5, 100), RefHash::derived(parent, 5, 100));
        assert_ne!(RefHash::derived(parent, 5, 100), RefHash::derived(parent, 5, 101));
        assert_ne!(RefHash::derived(parent, 5, 100), parent);
    }

    #[test]
    fn record_roundtrips_through_json() {
        let mut record = record();
        record.tx_hash = Some(B256::with_last_byte(9));
        record.nonce = Some(3);
        record.status = TxStatus::Submitted;

        let value = serde_json::to_value(&record).unwrap();
        let decoded: TransactionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.status, TxStatus::Submitted);
        assert_eq!(decoded.nonce, Some(3));
        assert_eq!(decoded.ref_hash, record.ref_hash);
    }
}
