use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{
    check_delta_signs, fill_delta, weighted_exec_price, FillDelta, Ledger, LedgerError,
};
use crate::db::{orders, users};
use crate::models::{OrderDocument, UserBalance};
use crate::units;

/// Postgres-backed settlement ledger.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
    fee_rate: Decimal,
}

impl PgLedger {
    pub fn new(pool: PgPool, fee_rate: Decimal) -> Self {
        Self { pool, fee_rate }
    }

    async fn fetch(&self, order_id: &str) -> Result<OrderDocument, LedgerError> {
        orders::get_by_order_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))
    }

    /// Round the fill's human-unit deltas to base units and apply both
    /// increments in one statement.
    async fn apply_balance(&self, username: &str, delta: &FillDelta) -> Result<(), LedgerError> {
        check_delta_signs(delta.bitclout, delta.ether)?;
        let nanos = units::to_nanos(delta.bitclout);
        let wei = units::to_wei(delta.ether);
        let touched = users::update_balance(&self.pool, username, nanos, wei).await?;
        if touched == 0 {
            return Err(LedgerError::UserNotFound(username.to_string()));
        }
        Ok(())
    }
}

impl Ledger for PgLedger {
    async fn create_order(&self, doc: &OrderDocument) -> Result<(), LedgerError> {
        orders::insert(&self.pool, doc).await.map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                LedgerError::DuplicateOrder(doc.order_id.clone())
            }
            _ => LedgerError::Db(err),
        })
    }

    async fn cancel_complete_order(&self, order_id: &str, reason: &str) -> Result<(), LedgerError> {
        tracing::info!("cancel complete: {} ({})", order_id, reason);
        orders::cancel_complete(&self.pool, order_id, reason).await?;
        Ok(())
    }

    async fn complete_limit_order(
        &self,
        order_id: &str,
        total_price: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError> {
        tracing::info!("fulfill: {}", order_id);
        let doc = self.fetch(order_id).await?;
        let delta = fill_delta(doc.side, doc.remaining(), total_price, eth_usd, self.fee_rate)?;
        self.apply_balance(&doc.username, &delta).await?;
        let exec_price = total_price / doc.quantity;
        orders::apply_complete(&self.pool, order_id, exec_price, delta.fees, delta.ether_quantity)
            .await?;
        Ok(())
    }

    async fn partial_limit_order(
        &self,
        order_id: &str,
        quantity_delta: Decimal,
        total_price: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError> {
        tracing::info!("partial fulfill: {} - {}", order_id, quantity_delta);
        let doc = self.fetch(order_id).await?;
        let delta = fill_delta(doc.side, quantity_delta, total_price, eth_usd, self.fee_rate)?;
        self.apply_balance(&doc.username, &delta).await?;
        let exec_price = weighted_exec_price(
            doc.exec_price,
            doc.quantity_processed,
            total_price,
            quantity_delta,
        );
        orders::apply_partial(
            &self.pool,
            order_id,
            quantity_delta,
            exec_price,
            delta.fees,
            delta.ether_quantity,
        )
        .await?;
        Ok(())
    }

    async fn complete_limit_order_direct(
        &self,
        order_id: &str,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError> {
        tracing::info!("fulfill direct: {}", order_id);
        let doc = self.fetch(order_id).await?;
        let price = doc
            .price
            .ok_or_else(|| LedgerError::MissingPrice(order_id.to_string()))?;
        let quantity_delta = doc.remaining();
        let total_price = quantity_delta * price;
        let delta = fill_delta(doc.side, quantity_delta, total_price, eth_usd, self.fee_rate)?;
        self.apply_balance(&doc.username, &delta).await?;
        orders::apply_complete(&self.pool, order_id, price, delta.fees, delta.ether_quantity)
            .await?;
        Ok(())
    }

    async fn partial_limit_order_direct(
        &self,
        order_id: &str,
        quantity_delta: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError> {
        tracing::info!("partial fulfill direct: {} - {}", order_id, quantity_delta);
        let doc = self.fetch(order_id).await?;
        let price = doc
            .price
            .ok_or_else(|| LedgerError::MissingPrice(order_id.to_string()))?;
        let total_price = quantity_delta * price;
        let delta = fill_delta(doc.side, quantity_delta, total_price, eth_usd, self.fee_rate)?;
        self.apply_balance(&doc.username, &delta).await?;
        // all direct fills execute at the limit price, so the running average
        // is the price itself
        orders::apply_partial(
            &self.pool,
            order_id,
            quantity_delta,
            price,
            delta.fees,
            delta.ether_quantity,
        )
        .await?;
        Ok(())
    }

    async fn market_order(
        &self,
        order_id: &str,
        quantity_processed: Decimal,
        total_price: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError> {
        tracing::info!(
            "fulfilling market order {} - processed: {}",
            order_id,
            quantity_processed
        );
        let doc = self.fetch(order_id).await?;
        let delta = fill_delta(doc.side, quantity_processed, total_price, eth_usd, self.fee_rate)?;
        self.apply_balance(&doc.username, &delta).await?;
        let exec_price = total_price / quantity_processed;
        orders::apply_market(
            &self.pool,
            order_id,
            quantity_processed,
            exec_price,
            delta.fees,
            delta.ether_quantity,
        )
        .await?;
        Ok(())
    }

    async fn order_complete(&self, order_id: &str) -> Result<Option<bool>, LedgerError> {
        let complete: Option<bool> =
            sqlx::query_scalar("SELECT complete FROM orders WHERE order_id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(complete)
    }

    async fn user_balance(&self, username: &str) -> Result<UserBalance, LedgerError> {
        let user = users::get_by_username(&self.pool, username)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))?;
        Ok(user.balance())
    }

    async fn open_order_count(&self, username: &str) -> Result<u64, LedgerError> {
        let count = orders::open_count(&self.pool, username).await?;
        Ok(count.max(0) as u64)
    }

    async fn open_orders(&self, username: &str) -> Result<Vec<OrderDocument>, LedgerError> {
        Ok(orders::open_for_user(&self.pool, username).await?)
    }

    async fn username_for_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<String>, LedgerError> {
        let user = users::get_by_public_key(&self.pool, public_key).await?;
        Ok(user.map(|u| u.username))
    }
}
