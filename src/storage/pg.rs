//! Transaction store implementation using a PostgreSQL database.
//!
//! Records are persisted as JSON documents alongside the columns the watcher
//! queries by (`status`, `from_address`, `nonce`, `tx_hash`). Schema
//! migrations and connection management are the host's concern.

use super::{StorageApi, api::Result};
use crate::transactions::{RefHash, TransactionRecord, TxStatus};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use eyre::eyre;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashMap;

/// PostgreSQL storage implementation.
#[derive(Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Creates a new PostgreSQL storage instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_record(row: &PgRow) -> Result<TransactionRecord> {
    let value: serde_json::Value = row.try_get("record").map_err(eyre::Error::from)?;
    Ok(serde_json::from_value(value).map_err(eyre::Error::from)?)
}

fn status_strings(statuses: &[TxStatus]) -> Vec<String> {
    statuses.iter().map(|status| status.to_string()).collect()
}

#[async_trait]
impl StorageApi for PgStorage {
    async fn read_transaction(&self, ref_hash: RefHash) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query("SELECT record FROM watcher_txs WHERE ref_hash = $1")
            .bind(ref_hash.as_slice())
            .fetch_optional(&self.pool)
            .await
            .map_err(eyre::Error::from)?;

        row.as_ref().map(decode_record).transpose()
    }

    async fn read_transactions_by_status(
        &self,
        statuses: &[TxStatus],
    ) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            "SELECT record FROM watcher_txs WHERE status = ANY($1) ORDER BY created_at",
        )
        .bind(status_strings(statuses))
        .fetch_all(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        rows.iter().map(decode_record).collect()
    }

    async fn read_by_nonce_excluding_hash(
        &self,
        from: Address,
        nonce: u64,
        excluding: B256,
    ) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT record FROM watcher_txs
            WHERE from_address = $1 AND nonce = $2 AND tx_hash IS DISTINCT FROM $3
            "#,
        )
        .bind(from.as_slice())
        .bind(nonce as i64)
        .bind(excluding.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        rows.iter().map(decode_record).collect()
    }

    async fn in_flight_counts(&self) -> Result<HashMap<Address, usize>> {
        let rows = sqlx::query(
            r#"
            SELECT from_address, COUNT(*) AS count FROM watcher_txs
            WHERE status = ANY($1) AND from_address IS NOT NULL
            GROUP BY from_address
            "#,
        )
        .bind(status_strings(&TxStatus::IN_FLIGHT))
        .fetch_all(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        rows.into_iter()
            .map(|row| {
                let address: Vec<u8> = row.try_get("from_address").map_err(eyre::Error::from)?;
                let count: i64 = row.try_get("count").map_err(eyre::Error::from)?;
                let address = Address::try_from(address.as_slice())
                    .map_err(|err| eyre!("malformed signer address in store: {err}"))?;
                Ok((address, count as usize))
            })
            .collect()
    }

    async fn write_transaction(&self, record: &TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watcher_txs (ref_hash, status, from_address, nonce, tx_hash, created_at, record)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (ref_hash) DO UPDATE
            SET status = $2, from_address = $3, nonce = $4, tx_hash = $5, record = $7
            "#,
        )
        .bind(record.ref_hash.as_slice())
        .bind(record.status.to_string())
        .bind(record.from.map(|address| address.as_slice().to_vec()))
        .bind(record.nonce.map(|nonce| nonce as i64))
        .bind(record.tx_hash.map(|hash| hash.as_slice().to_vec()))
        .bind(record.created_at)
        .bind(serde_json::to_value(record).map_err(eyre::Error::from)?)
        .execute(&self.pool)
        .await
        .map_err(eyre::Error::from)?;

        Ok(())
    }
}
