#![allow(dead_code)]
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::Pool;

pub async fn get_all(pool: &PgPool) -> Result<Vec<Pool>, sqlx::Error> {
    sqlx::query_as::<_, Pool>("SELECT id, address, eth_wei, usdc_micro, active FROM pools")
        .fetch_all(pool)
        .await
}

/// Sum of Ether held across every custody pool, in wei.
pub async fn total_eth_wei(pool: &PgPool) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(eth_wei), 0) FROM pools")
        .fetch_one(pool)
        .await
}
