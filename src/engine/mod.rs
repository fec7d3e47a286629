//! The matching core: price-time priority continuous double auction over the
//! in-memory book, with settlement committed against the ledger before each
//! matching step returns.
//!
//! The book is the only mutable shared state; one `RwLock` serializes every
//! read-modify-write (matching, cancel, sanitize) while the pure quote
//! helpers take reader access.

mod solvency;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ledger::{Ledger, LedgerError};
use crate::metrics;
use crate::models::{
    LimitOrderRequest, MarketOrderRequest, OrderDocument, OrderType, Side,
};
use crate::orderbook::{order_id, BookError, DepthSnapshot, Order, OrderBook, SnapshotError};
use crate::services::oracle::PriceOracle;
use crate::services::snapshot::SnapshotHandle;

pub use solvency::BalanceCheck;

/// Open limit orders allowed per user.
pub const MAX_ACTIVE_ORDERS: u64 = 10;

/// Largest admissible order quantity, in BitClout.
pub const MAX_ORDER_QUANTITY: u32 = 500;

pub(crate) const INSUFFICIENT_FUNDS: &str = "Insufficient funds";
pub(crate) const USER_IN_TRANSACTION: &str = "User in transaction";
pub(crate) const INSUFFICIENT_QUANTITY: &str = "Insufficient quantity";

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("invalid side")]
    InvalidSide,
    #[error("invalid quantity")]
    InvalidQuantity,
    #[error("invalid price")]
    InvalidPrice,
    #[error("order already exists")]
    OrderExists,
    #[error("order does not exist")]
    OrderNotExists,
    #[error("insufficient quantity on book")]
    InsufficientQuantity,
    #[error("{}", INSUFFICIENT_FUNDS)]
    InsufficientBalance,
    #[error("{}", USER_IN_TRANSACTION)]
    UserInTransaction,
    #[error("too many active orders")]
    MaxActiveOrders,
    #[error("slippage tolerance exceeded")]
    SlippageExceeded,
    #[error("exchange unavailable: {0}")]
    GateClosed(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<BookError> for ExchangeError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::OrderExists(_) => ExchangeError::OrderExists,
            BookError::OrderNotExists(_) => ExchangeError::OrderNotExists,
        }
    }
}

/// The exchange: book + ledger + oracle, plus the snapshot channel that gets
/// nudged after every mutation.
pub struct Exchange<L> {
    book: Arc<RwLock<OrderBook>>,
    ledger: L,
    oracle: Arc<PriceOracle>,
    snapshots: SnapshotHandle,
}

impl<L: Ledger> Exchange<L> {
    pub fn new(
        book: Arc<RwLock<OrderBook>>,
        ledger: L,
        oracle: Arc<PriceOracle>,
        snapshots: SnapshotHandle,
    ) -> Self {
        Self {
            book,
            ledger,
            oracle,
            snapshots,
        }
    }

    pub fn book(&self) -> Arc<RwLock<OrderBook>> {
        self.book.clone()
    }

    pub(crate) fn ledger(&self) -> &L {
        &self.ledger
    }

    fn eth_usd(&self) -> Result<Decimal, ExchangeError> {
        self.oracle
            .eth_usd()
            .map_err(|e| ExchangeError::Upstream(e.to_string()))
    }

    fn check_quantity(quantity: Decimal) -> Result<(), ExchangeError> {
        if quantity <= Decimal::ZERO || quantity > Decimal::from(MAX_ORDER_QUANTITY) {
            return Err(ExchangeError::InvalidQuantity);
        }
        Ok(())
    }

    /// Admit and execute a limit order. The id of the ledger row is returned;
    /// any residual quantity is resting on the book.
    pub async fn place_limit_order(
        &self,
        req: &LimitOrderRequest,
    ) -> Result<String, ExchangeError> {
        let side: Side = req
            .order_side
            .parse()
            .map_err(|_| ExchangeError::InvalidSide)?;
        let quantity = req.order_quantity;
        let price = req.order_price;
        Self::check_quantity(quantity)?;
        if price <= Decimal::ZERO {
            return Err(ExchangeError::InvalidPrice);
        }
        let eth_usd = self.eth_usd()?;

        let balance = self.ledger.user_balance(&req.username).await?;
        if balance.in_transaction {
            return Err(ExchangeError::UserInTransaction);
        }
        if self.ledger.open_order_count(&req.username).await? >= MAX_ACTIVE_ORDERS {
            return Err(ExchangeError::MaxActiveOrders);
        }
        let covered = match side {
            Side::Buy => (quantity * price) / eth_usd <= balance.ether(),
            Side::Sell => quantity <= balance.bitclout(),
        };
        if !covered {
            return Err(ExchangeError::InsufficientBalance);
        }

        let created = Utc::now();
        let id = order_id(OrderType::Limit, side, &req.username, quantity, created);
        let doc = OrderDocument::new(
            id.clone(),
            req.username.clone(),
            side,
            OrderType::Limit,
            quantity,
            Some(price),
            created,
        );
        self.ledger.create_order(&doc).await?;
        metrics::order_submitted("limit");

        match self
            .match_limit(side, &id, &req.username, quantity, price, created, eth_usd)
            .await
        {
            Ok((remaining, total_price)) => {
                tracing::info!(
                    "limit {} matched: remaining {} total {}",
                    id,
                    remaining,
                    total_price
                );
                self.snapshots.schedule();
                Ok(id)
            }
            Err(err) => {
                self.abort_order(&id, &err).await;
                Err(err)
            }
        }
    }

    /// Admit and execute a market order against the caller's quote/slippage
    /// envelope.
    pub async fn place_market_order(
        &self,
        req: &MarketOrderRequest,
        slippage: Decimal,
        quote: Decimal,
    ) -> Result<String, ExchangeError> {
        let side: Side = req
            .order_side
            .parse()
            .map_err(|_| ExchangeError::InvalidSide)?;
        let quantity = req.order_quantity;
        Self::check_quantity(quantity)?;
        let eth_usd = self.eth_usd()?;

        // quote/slippage envelope around the simulated sweep, in the quote
        // currency
        let (estimate_usd, _) = {
            let book = self.book.read().await;
            market_price_sweep(&book, side, quantity)
        };
        let estimate = estimate_usd / eth_usd;
        if quote <= Decimal::ZERO {
            return Err(ExchangeError::SlippageExceeded);
        }
        let deviation = ((quote - estimate) / quote).abs();
        if deviation > slippage {
            tracing::warn!(
                "slippage rejection: quote {} estimate {} tolerance {}",
                quote,
                estimate,
                slippage
            );
            return Err(ExchangeError::SlippageExceeded);
        }

        let balance = self.ledger.user_balance(&req.username).await?;
        if balance.in_transaction {
            return Err(ExchangeError::UserInTransaction);
        }
        let covered = match side {
            Side::Buy => estimate <= balance.ether(),
            Side::Sell => quantity <= balance.bitclout(),
        };
        if !covered {
            return Err(ExchangeError::InsufficientBalance);
        }

        let created = Utc::now();
        let id = order_id(OrderType::Market, side, &req.username, quantity, created);
        let doc = OrderDocument::new(
            id.clone(),
            req.username.clone(),
            side,
            OrderType::Market,
            quantity,
            None,
            created,
        );
        self.ledger.create_order(&doc).await?;
        metrics::order_submitted("market");

        match self.match_market(side, &id, quantity, eth_usd).await {
            Ok((remaining, total_price)) => {
                tracing::info!(
                    "market {} matched: remaining {} total {}",
                    id,
                    remaining,
                    total_price
                );
                self.snapshots.schedule();
                Ok(id)
            }
            Err(err) => {
                self.abort_order(&id, &err).await;
                Err(err)
            }
        }
    }

    /// Cancel a resting order. Fails without side effects when the id is not
    /// on the book.
    pub async fn cancel_order(&self, order_id: &str, reason: &str) -> Result<Order, ExchangeError> {
        let removed = {
            let mut book = self.book.write().await;
            book.remove(order_id)?
        };
        self.ledger.cancel_complete_order(order_id, reason).await?;
        metrics::order_cancelled("user");
        self.snapshots.schedule();
        Ok(removed)
    }

    pub async fn get_order(&self, order_id: &str) -> Option<Order> {
        self.book.read().await.get(order_id).cloned()
    }

    pub async fn depth(&self) -> DepthSnapshot {
        self.book.read().await.depth()
    }

    /// Total price of sweeping `quantity` off the opposite side at current
    /// depth. Pure simulation, no mutation.
    pub async fn calculate_market_price(
        &self,
        side: Side,
        quantity: Decimal,
    ) -> Result<Decimal, ExchangeError> {
        if quantity <= Decimal::ZERO {
            return Err(ExchangeError::InvalidQuantity);
        }
        let book = self.book.read().await;
        let (price, exhausted) = market_price_sweep(&book, side, quantity);
        if exhausted {
            return Err(ExchangeError::InsufficientQuantity);
        }
        Ok(price)
    }

    /// Quantity obtainable for a total price budget at current depth.
    pub async fn calculate_market_quantity(
        &self,
        side: Side,
        max_price: Decimal,
    ) -> Result<Decimal, ExchangeError> {
        if max_price <= Decimal::ZERO {
            return Err(ExchangeError::InvalidPrice);
        }
        let book = self.book.read().await;
        Ok(market_quantity_sweep(&book, side, max_price))
    }

    pub async fn encode_book(&self) -> serde_json::Result<Vec<u8>> {
        self.book.read().await.encode()
    }

    /// Replace the live book with a decoded snapshot. Returns the number of
    /// restored orders.
    pub async fn restore_book(&self, data: &[u8]) -> Result<usize, SnapshotError> {
        let restored = OrderBook::decode(data)?;
        let count = restored.len();
        *self.book.write().await = restored;
        Ok(count)
    }

    /// Drop recovered residuals whose ledger rows are already terminal. The
    /// ledger is the truth after a crash between a complete-fill write and
    /// the matching book removal. Returns the number of residuals dropped.
    pub async fn reconcile_recovered(&self) -> Result<usize, ExchangeError> {
        let ids: Vec<String> = {
            let book = self.book.read().await;
            book.order_ids().map(str::to_owned).collect()
        };
        let mut dropped = 0;
        for id in ids {
            let terminal = match self.ledger.order_complete(&id).await? {
                Some(complete) => complete,
                None => true,
            };
            if terminal {
                tracing::warn!("dropping recovered residual with terminal ledger row: {}", id);
                let mut book = self.book.write().await;
                if book.remove(&id).is_ok() {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            self.snapshots.schedule();
        }
        Ok(dropped)
    }

    /// Terminal bookkeeping for an order whose matching or settlement
    /// failed: the ledger row is cancelled with the failure reason and any
    /// residual is taken off the book. Fills already committed for resting
    /// orders stand.
    async fn abort_order(&self, order_id: &str, err: &ExchangeError) {
        {
            let mut book = self.book.write().await;
            let _ = book.remove(order_id);
        }
        if let Err(cancel_err) = self
            .ledger
            .cancel_complete_order(order_id, &err.to_string())
            .await
        {
            tracing::error!("failed to cancel {} after error: {}", order_id, cancel_err);
        }
        metrics::order_cancelled("error");
        self.snapshots.schedule();
    }

    async fn match_limit(
        &self,
        side: Side,
        id: &str,
        user: &str,
        quantity: Decimal,
        price: Decimal,
        created: DateTime<Utc>,
        eth_usd: Decimal,
    ) -> Result<(Decimal, Decimal), ExchangeError> {
        let mut book = self.book.write().await;
        if book.contains(id) {
            return Err(ExchangeError::OrderExists);
        }

        let mut remaining = quantity;
        let mut total_price = Decimal::ZERO;
        while remaining > Decimal::ZERO {
            let Some(best) = book.best_price(side.opposite()) else {
                break;
            };
            let crosses = match side {
                Side::Buy => best <= price,
                Side::Sell => best >= price,
            };
            if !crosses {
                break;
            }
            let (left, value) = self
                .process_queue(&mut book, side.opposite(), best, remaining, eth_usd)
                .await?;
            total_price += value;
            remaining = left;
        }

        let filled = quantity - remaining;
        if remaining > Decimal::ZERO {
            book.insert_resting(Order::new(id, user, side, remaining, price, created))?;
            if filled > Decimal::ZERO {
                // the entering order crossed partially before resting
                if let Err(err) = self
                    .ledger
                    .partial_limit_order(id, filled, total_price, eth_usd)
                    .await
                {
                    let _ = book.remove(id);
                    return Err(err.into());
                }
            }
        } else {
            self.ledger
                .complete_limit_order(id, total_price, eth_usd)
                .await?;
        }
        Ok((remaining, total_price))
    }

    async fn match_market(
        &self,
        side: Side,
        id: &str,
        quantity: Decimal,
        eth_usd: Decimal,
    ) -> Result<(Decimal, Decimal), ExchangeError> {
        let mut book = self.book.write().await;
        let mut remaining = quantity;
        let mut total_price = Decimal::ZERO;
        while remaining > Decimal::ZERO {
            let Some(best) = book.best_price(side.opposite()) else {
                break;
            };
            let (left, value) = self
                .process_queue(&mut book, side.opposite(), best, remaining, eth_usd)
                .await?;
            total_price += value;
            remaining = left;
        }

        let filled = quantity - remaining;
        if filled.is_zero() {
            // book exhausted before anything crossed
            self.ledger
                .cancel_complete_order(id, INSUFFICIENT_QUANTITY)
                .await?;
        } else {
            self.ledger
                .market_order(id, filled, total_price, eth_usd)
                .await?;
        }
        Ok((remaining, total_price))
    }

    /// Consume the head of one price level while quantity remains. Each head
    /// is solvency-checked first; a failing head is cancelled and matching
    /// moves to the next without consuming quantity. Settlement for a fill
    /// commits before the corresponding book mutation.
    async fn process_queue(
        &self,
        book: &mut OrderBook,
        resting_side: Side,
        price: Decimal,
        quantity: Decimal,
        eth_usd: Decimal,
    ) -> Result<(Decimal, Decimal), ExchangeError> {
        let mut remaining = quantity;
        let mut total_price = Decimal::ZERO;
        while remaining > Decimal::ZERO {
            let head = match book.head(resting_side, price) {
                Some(order) => order.clone(),
                None => break,
            };

            match self.check_balance(&head, true, eth_usd).await? {
                BalanceCheck::Rejected(reason) => {
                    tracing::warn!("validation failed for {}: {}", head.id, reason);
                    self.ledger.cancel_complete_order(&head.id, reason).await?;
                    book.remove(&head.id)?;
                    metrics::order_cancelled("solvency");
                    continue;
                }
                BalanceCheck::Ok => {}
            }

            if remaining < head.quantity {
                let fill_value = remaining * head.price;
                self.ledger
                    .partial_limit_order_direct(&head.id, remaining, eth_usd)
                    .await?;
                book.reduce_head(resting_side, price, head.quantity - remaining)?;
                total_price += fill_value;
                remaining = Decimal::ZERO;
                metrics::order_matched("partial");
            } else {
                let fill_value = head.quantity * head.price;
                self.ledger
                    .complete_limit_order_direct(&head.id, eth_usd)
                    .await?;
                book.remove(&head.id)?;
                total_price += fill_value;
                remaining -= head.quantity;
                metrics::order_matched("complete");
            }
        }
        Ok((remaining, total_price))
    }
}

/// Walk the opposite side best to worst accumulating level value until the
/// requested quantity is satisfied. Returns the accumulated price and
/// whether the side was exhausted first.
pub(crate) fn market_price_sweep(
    book: &OrderBook,
    side: Side,
    quantity: Decimal,
) -> (Decimal, bool) {
    let opposite = book.side(side.opposite());
    let mut price = Decimal::ZERO;
    let mut remaining = quantity;
    let mut level = match side {
        Side::Buy => opposite.min_price_queue(),
        Side::Sell => opposite.max_price_queue(),
    };
    while remaining > Decimal::ZERO {
        let Some(queue) = level else {
            break;
        };
        let level_price = queue.price();
        let level_volume = queue.volume();
        if remaining >= level_volume {
            price += level_price * level_volume;
            remaining -= level_volume;
            level = match side {
                Side::Buy => opposite.greater_than(level_price),
                Side::Sell => opposite.less_than(level_price),
            };
        } else {
            price += level_price * remaining;
            remaining = Decimal::ZERO;
        }
    }
    (price, remaining > Decimal::ZERO)
}

/// Dual of [`market_price_sweep`]: walk best to worst consuming a price
/// budget; the final level is taken fractionally at `budget / price`.
pub(crate) fn market_quantity_sweep(book: &OrderBook, side: Side, max_price: Decimal) -> Decimal {
    let opposite = book.side(side.opposite());
    let mut budget = max_price;
    let mut quantity = Decimal::ZERO;
    let mut level = match side {
        Side::Buy => opposite.min_price_queue(),
        Side::Sell => opposite.max_price_queue(),
    };
    while budget > Decimal::ZERO {
        let Some(queue) = level else {
            break;
        };
        let level_price = queue.price();
        let level_volume = queue.volume();
        let level_value = level_price * level_volume;
        if budget >= level_value {
            quantity += level_volume;
            budget -= level_value;
            level = match side {
                Side::Buy => opposite.greater_than(level_price),
                Side::Sell => opposite.less_than(level_price),
            };
        } else {
            quantity += budget / level_price;
            budget = Decimal::ZERO;
        }
    }
    quantity
}
