//! The solvency guard: per-order balance validation, applied lazily against
//! each head during matching and eagerly across a user's open orders by the
//! sanitize sweep.

use rust_decimal::Decimal;

use super::{Exchange, ExchangeError, INSUFFICIENT_FUNDS, USER_IN_TRANSACTION};
use crate::ledger::{Ledger, LedgerError};
use crate::metrics;
use crate::models::Side;
use crate::orderbook::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCheck {
    Ok,
    Rejected(&'static str),
}

impl<L: Ledger> Exchange<L> {
    /// Can this order's owner still cover it? A buy must be covered in
    /// Ether at the current rate, a sell in BitClout. `check_in_transaction`
    /// is set during matching: a user mid-settlement of an on-chain deposit
    /// cannot trade.
    pub(crate) async fn check_balance(
        &self,
        order: &Order,
        check_in_transaction: bool,
        eth_usd: Decimal,
    ) -> Result<BalanceCheck, ExchangeError> {
        let balance = match self.ledger().user_balance(&order.user).await {
            Ok(balance) => balance,
            Err(LedgerError::UserNotFound(_)) => {
                return Ok(BalanceCheck::Rejected("User not found"))
            }
            Err(err) => return Err(err.into()),
        };
        if check_in_transaction && balance.in_transaction {
            return Ok(BalanceCheck::Rejected(USER_IN_TRANSACTION));
        }
        let covered = match order.side {
            Side::Buy => (order.price * order.quantity) / eth_usd <= balance.ether(),
            Side::Sell => order.quantity <= balance.bitclout(),
        };
        Ok(if covered {
            BalanceCheck::Ok
        } else {
            BalanceCheck::Rejected(INSUFFICIENT_FUNDS)
        })
    }

    /// Eager sweep over one user's open orders: every order still on the
    /// book is re-validated and cancelled if its owner can no longer cover
    /// it. Returns the number of cancellations.
    pub async fn sanitize_user(&self, public_key: &str) -> Result<usize, ExchangeError> {
        let username = self
            .ledger()
            .username_for_public_key(public_key)
            .await?
            .ok_or_else(|| {
                ExchangeError::Ledger(LedgerError::UserNotFound(public_key.to_string()))
            })?;
        let eth_usd = self.eth_usd()?;
        let docs = self.ledger().open_orders(&username).await?;

        let on_book: Vec<Order> = {
            let book = self.book.read().await;
            docs.iter()
                .filter_map(|doc| book.get(&doc.order_id).cloned())
                .collect()
        };

        let mut cancelled = 0;
        for order in on_book {
            tracing::debug!("validating: {}", order.id);
            if let BalanceCheck::Rejected(reason) =
                self.check_balance(&order, false, eth_usd).await?
            {
                tracing::warn!("validation failed for {}: {}", order.id, reason);
                {
                    let mut book = self.book.write().await;
                    if book.remove(&order.id).is_err() {
                        // already consumed by a concurrent match
                        continue;
                    }
                }
                self.ledger().cancel_complete_order(&order.id, reason).await?;
                metrics::order_cancelled("sanitize");
                cancelled += 1;
            }
        }
        self.snapshots.schedule();
        Ok(cancelled)
    }
}
