use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::User;

const USER_COLUMNS: &str = "id, username, public_key, bitclout_nanos, ether_wei, usdc_micro, \
     in_transaction, verified, created_at";

pub async fn get_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_public_key(
    pool: &PgPool,
    public_key: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE public_key = $1"
    ))
    .bind(public_key)
    .fetch_optional(pool)
    .await
}

/// Apply signed base-unit increments to both balance fields in one
/// statement. Returns the number of rows touched.
pub async fn update_balance(
    pool: &PgPool,
    username: &str,
    bitclout_nanos_delta: Decimal,
    ether_wei_delta: Decimal,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET bitclout_nanos = bitclout_nanos + $2, ether_wei = ether_wei + $3 \
         WHERE username = $1",
    )
    .bind(username)
    .bind(bitclout_nanos_delta)
    .bind(ether_wei_delta)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Sum of every user's balances, in base units (nanos, wei).
pub async fn total_balances(pool: &PgPool) -> Result<(Decimal, Decimal), sqlx::Error> {
    sqlx::query_as(
        "SELECT COALESCE(SUM(bitclout_nanos), 0), COALESCE(SUM(ether_wei), 0) FROM users",
    )
    .fetch_one(pool)
    .await
}
