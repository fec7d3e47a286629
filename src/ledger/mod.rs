//! The settlement ledger: transactional balance and order-document
//! mutations.
//!
//! Fill arithmetic is pure and shared by every implementation; the
//! [`Ledger`] trait is the storage seam. Postgres is the production
//! implementation, the matching scenario tests run against an in-memory one
//! with identical semantics.

pub mod pg;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{OrderDocument, Side, UserBalance};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("order not found: {0}")]
    OrderNotFound(String),
    #[error("order id already recorded: {0}")]
    DuplicateOrder(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("order has no limit price: {0}")]
    MissingPrice(String),
    #[error("exchange rate must be positive")]
    InvalidRate,
    #[error("balance deltas cannot share a sign")]
    UnbalancedUpdate,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Signed balance movement produced by one fill, in human units.
#[derive(Debug, Clone, PartialEq)]
pub struct FillDelta {
    /// Change to the owner's BitClout balance.
    pub bitclout: Decimal,
    /// Change to the owner's Ether balance.
    pub ether: Decimal,
    /// Fee retained by the platform, in the currency the owner receives.
    pub fees: Decimal,
    /// Counter-currency moved by the fill (unsigned), for the ledger row's
    /// `ether_quantity`.
    pub ether_quantity: Decimal,
}

/// Balance movement for a trade of `quantity_delta` BitClout at a total
/// counter-value of `total_price` USD, converted at `eth_usd`.
///
/// The buyer receives BitClout net of fees and pays Ether; the seller
/// delivers BitClout and receives Ether net of fees.
pub fn fill_delta(
    side: Side,
    quantity_delta: Decimal,
    total_price: Decimal,
    eth_usd: Decimal,
    fee_rate: Decimal,
) -> Result<FillDelta, LedgerError> {
    if eth_usd <= Decimal::ZERO {
        return Err(LedgerError::InvalidRate);
    }
    let ether_moved = total_price / eth_usd;
    Ok(match side {
        Side::Buy => {
            let fees = quantity_delta * fee_rate;
            FillDelta {
                bitclout: quantity_delta - fees,
                ether: -ether_moved,
                fees,
                ether_quantity: ether_moved,
            }
        }
        Side::Sell => {
            let fees = ether_moved * fee_rate;
            FillDelta {
                bitclout: -quantity_delta,
                ether: ether_moved - fees,
                fees,
                ether_quantity: ether_moved,
            }
        }
    })
}

/// The two-field balance update contract: exactly one of the deltas is
/// negative and the other positive.
pub fn check_delta_signs(bitclout: Decimal, ether: Decimal) -> Result<(), LedgerError> {
    if (bitclout > Decimal::ZERO) == (ether > Decimal::ZERO) {
        return Err(LedgerError::UnbalancedUpdate);
    }
    Ok(())
}

/// Running volume-weighted average execution price after a partial fill.
pub fn weighted_exec_price(
    old_exec: Option<Decimal>,
    old_processed: Decimal,
    total_price: Decimal,
    quantity_delta: Decimal,
) -> Decimal {
    (old_exec.unwrap_or_default() * old_processed + total_price) / (old_processed + quantity_delta)
}

/// Storage seam for the settlement ledger: the order-document lifecycle plus
/// the balance reads the solvency guard needs.
#[allow(async_fn_in_trait)]
pub trait Ledger: Send + Sync {
    async fn create_order(&self, doc: &OrderDocument) -> Result<(), LedgerError>;

    /// Terminal cancel: `error = reason`, `complete = true`. Idempotent.
    async fn cancel_complete_order(&self, order_id: &str, reason: &str) -> Result<(), LedgerError>;

    /// Complete fill of the entering order at an accumulated total price.
    async fn complete_limit_order(
        &self,
        order_id: &str,
        total_price: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError>;

    /// Partial fill of the entering order at an accumulated total price.
    async fn partial_limit_order(
        &self,
        order_id: &str,
        quantity_delta: Decimal,
        total_price: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError>;

    /// Complete fill of a resting order at its own limit price.
    async fn complete_limit_order_direct(
        &self,
        order_id: &str,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError>;

    /// Partial fill of a resting order at its own limit price.
    async fn partial_limit_order_direct(
        &self,
        order_id: &str,
        quantity_delta: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError>;

    /// Single terminal write for a market order.
    async fn market_order(
        &self,
        order_id: &str,
        quantity_processed: Decimal,
        total_price: Decimal,
        eth_usd: Decimal,
    ) -> Result<(), LedgerError>;

    /// Is this order's row terminal? `None` when no row exists.
    async fn order_complete(&self, order_id: &str) -> Result<Option<bool>, LedgerError>;

    async fn user_balance(&self, username: &str) -> Result<UserBalance, LedgerError>;

    async fn open_order_count(&self, username: &str) -> Result<u64, LedgerError>;

    async fn open_orders(&self, username: &str) -> Result<Vec<OrderDocument>, LedgerError>;

    async fn username_for_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<String>, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buyer_delta_charges_ether_and_fees_in_bitclout() {
        // 2 BCLT at 200 USD total, ETHUSD = 100, fee 1%
        let delta = fill_delta(Side::Buy, dec!(2), dec!(200), dec!(100), dec!(0.01)).unwrap();
        assert_eq!(delta.fees, dec!(0.02));
        assert_eq!(delta.bitclout, dec!(1.98));
        assert_eq!(delta.ether, dec!(-2));
        assert_eq!(delta.ether_quantity, dec!(2));
    }

    #[test]
    fn seller_delta_charges_fees_in_ether() {
        let delta = fill_delta(Side::Sell, dec!(2), dec!(200), dec!(100), dec!(0.01)).unwrap();
        assert_eq!(delta.bitclout, dec!(-2));
        assert_eq!(delta.fees, dec!(0.02));
        assert_eq!(delta.ether, dec!(1.98));
    }

    #[test]
    fn quantity_conserved_before_fees() {
        let buy = fill_delta(Side::Buy, dec!(3), dec!(450), dec!(150), dec!(0.02)).unwrap();
        let sell = fill_delta(Side::Sell, dec!(3), dec!(450), dec!(150), dec!(0.02)).unwrap();
        assert_eq!(buy.bitclout + buy.fees, sell.bitclout.abs());
        assert_eq!(sell.ether + sell.fees, buy.ether.abs());
    }

    #[test]
    fn zero_rate_is_an_error() {
        assert!(matches!(
            fill_delta(Side::Buy, dec!(1), dec!(100), Decimal::ZERO, dec!(0.01)),
            Err(LedgerError::InvalidRate)
        ));
    }

    #[test]
    fn delta_sign_contract() {
        assert!(check_delta_signs(dec!(1), dec!(-1)).is_ok());
        assert!(check_delta_signs(dec!(-1), dec!(1)).is_ok());
        assert!(check_delta_signs(dec!(1), dec!(1)).is_err());
        assert!(check_delta_signs(dec!(-1), dec!(-1)).is_err());
        assert!(check_delta_signs(Decimal::ZERO, Decimal::ZERO).is_err());
    }

    #[test]
    fn exec_price_is_volume_weighted() {
        // first fill: 1 @ 100
        let first = weighted_exec_price(None, dec!(0), dec!(100), dec!(1));
        assert_eq!(first, dec!(100));
        // second fill: 2 @ 101 -> (100*1 + 202) / 3
        let second = weighted_exec_price(Some(first), dec!(1), dec!(202), dec!(2));
        assert_eq!(second.round_dp(10), dec!(100.6666666667));
    }
}
