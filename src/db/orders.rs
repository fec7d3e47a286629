use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::OrderDocument;

const ORDER_COLUMNS: &str = "id, order_id, username, side, order_type, quantity, price, \
     quantity_processed, exec_price, ether_quantity, fees, complete, complete_time, error, \
     created_at";

pub async fn insert(pool: &PgPool, doc: &OrderDocument) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, order_id, username, side, order_type, quantity, price, \
         quantity_processed, exec_price, ether_quantity, fees, complete, complete_time, error, \
         created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(doc.id)
    .bind(&doc.order_id)
    .bind(&doc.username)
    .bind(doc.side)
    .bind(doc.order_type)
    .bind(doc.quantity)
    .bind(doc.price)
    .bind(doc.quantity_processed)
    .bind(doc.exec_price)
    .bind(doc.ether_quantity)
    .bind(doc.fees)
    .bind(doc.complete)
    .bind(doc.complete_time)
    .bind(&doc.error)
    .bind(doc.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_order_id(
    pool: &PgPool,
    order_id: &str,
) -> Result<Option<OrderDocument>, sqlx::Error> {
    sqlx::query_as::<_, OrderDocument>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await
}

/// Terminal cancel. Setting the same fields again on an already-complete row
/// is a no-op semantically, so repeated cancels are harmless.
pub async fn cancel_complete(
    pool: &PgPool,
    order_id: &str,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET error = $2, complete = TRUE, complete_time = $3 WHERE order_id = $1",
    )
    .bind(order_id)
    .bind(reason)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Complete-fill write: processed jumps to the full quantity, cumulative
/// fields increment.
pub async fn apply_complete(
    pool: &PgPool,
    order_id: &str,
    exec_price: Decimal,
    fees_delta: Decimal,
    ether_quantity_delta: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET quantity_processed = quantity, complete = TRUE, complete_time = $2, \
         exec_price = $3, fees = fees + $4, ether_quantity = ether_quantity + $5 \
         WHERE order_id = $1",
    )
    .bind(order_id)
    .bind(Utc::now())
    .bind(exec_price)
    .bind(fees_delta)
    .bind(ether_quantity_delta)
    .execute(pool)
    .await?;
    Ok(())
}

/// Partial-fill write: every cumulative field increments, the row stays open.
pub async fn apply_partial(
    pool: &PgPool,
    order_id: &str,
    quantity_delta: Decimal,
    exec_price: Decimal,
    fees_delta: Decimal,
    ether_quantity_delta: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET quantity_processed = quantity_processed + $2, exec_price = $3, \
         fees = fees + $4, ether_quantity = ether_quantity + $5 WHERE order_id = $1",
    )
    .bind(order_id)
    .bind(quantity_delta)
    .bind(exec_price)
    .bind(fees_delta)
    .bind(ether_quantity_delta)
    .execute(pool)
    .await?;
    Ok(())
}

/// Single terminal write for a market order.
pub async fn apply_market(
    pool: &PgPool,
    order_id: &str,
    quantity_processed: Decimal,
    exec_price: Decimal,
    fees: Decimal,
    ether_quantity: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET quantity_processed = $2, exec_price = $3, fees = $4, \
         ether_quantity = $5, complete = TRUE, complete_time = $6 WHERE order_id = $1",
    )
    .bind(order_id)
    .bind(quantity_processed)
    .bind(exec_price)
    .bind(fees)
    .bind(ether_quantity)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn open_for_user(
    pool: &PgPool,
    username: &str,
) -> Result<Vec<OrderDocument>, sqlx::Error> {
    sqlx::query_as::<_, OrderDocument>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE username = $1 AND complete = FALSE"
    ))
    .bind(username)
    .fetch_all(pool)
    .await
}

pub async fn open_count(pool: &PgPool, username: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE username = $1 AND complete = FALSE")
        .bind(username)
        .fetch_one(pool)
        .await
}

/// Cumulative fees: BitClout fees accrue on buy rows, Ether fees on sell
/// rows (the currency the owner receives).
pub async fn total_fees(pool: &PgPool) -> Result<(Decimal, Decimal), sqlx::Error> {
    let bitclout: Decimal =
        sqlx::query_scalar("SELECT COALESCE(SUM(fees), 0) FROM orders WHERE side = 'buy'")
            .fetch_one(pool)
            .await?;
    let ether: Decimal =
        sqlx::query_scalar("SELECT COALESCE(SUM(fees), 0) FROM orders WHERE side = 'sell'")
            .fetch_one(pool)
            .await?;
    Ok((bitclout, ether))
}
