use sqlx::PgPool;

use crate::models::Wallet;

const WALLET_COLUMNS: &str = "id, public_key, swept_fees_nanos, is_main, status";

/// The custody account FireEye reconciles against.
pub async fn get_main(pool: &PgPool) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as::<_, Wallet>(&format!(
        "SELECT {WALLET_COLUMNS} FROM wallets WHERE is_main = TRUE"
    ))
    .fetch_optional(pool)
    .await
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<Wallet>, sqlx::Error> {
    sqlx::query_as::<_, Wallet>(&format!("SELECT {WALLET_COLUMNS} FROM wallets"))
        .fetch_all(pool)
        .await
}
