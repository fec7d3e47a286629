#![allow(dead_code)]
use chrono::Utc;
use sqlx::PgPool;

use crate::models::Transaction;

const TXN_COLUMNS: &str = "id, username, asset_type, value, usd_value_at_time, state, txn_hash, \
     gas_price, created_at, completed_at";

/// Insert a deposit row. The unique `txn_hash` index makes re-observing the
/// same on-chain transaction a no-op.
pub async fn insert_deposit(pool: &PgPool, txn: &Transaction) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO transactions (id, username, asset_type, value, usd_value_at_time, state, \
         txn_hash, gas_price, created_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (txn_hash) DO NOTHING",
    )
    .bind(txn.id)
    .bind(&txn.username)
    .bind(txn.asset_type)
    .bind(txn.value)
    .bind(txn.usd_value_at_time)
    .bind(txn.state)
    .bind(&txn.txn_hash)
    .bind(txn.gas_price)
    .bind(txn.created_at)
    .bind(txn.completed_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_by_hash(
    pool: &PgPool,
    txn_hash: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TXN_COLUMNS} FROM transactions WHERE txn_hash = $1"
    ))
    .bind(txn_hash)
    .fetch_optional(pool)
    .await
}

pub async fn mark_done(pool: &PgPool, txn_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE transactions SET state = 'done', completed_at = $2 WHERE txn_hash = $1",
    )
    .bind(txn_hash)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}
