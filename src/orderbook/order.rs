use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{OrderType, Side};

/// A resting order on the book. Immutable once inserted except by replacement
/// with a reduced-quantity twin during a partial fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub side: Side,
    pub id: String,
    /// Owner of the order. Older snapshots predate this field; it is then
    /// recovered from the canonical id.
    #[serde(default)]
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        user: impl Into<String>,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            side,
            id: id.into(),
            user: user.into(),
            timestamp,
            quantity,
            price,
        }
    }

    /// Fallback for snapshots written before `user` was a stored field:
    /// the third dash-separated segment of the canonical id.
    pub fn user_from_id(id: &str) -> Option<&str> {
        id.split('-').nth(2)
    }
}

/// Canonical order id: `"<type>-<side>-<user>-<qty>-<ms_epoch>"`.
pub fn order_id(
    order_type: OrderType,
    side: Side,
    username: &str,
    quantity: Decimal,
    created: DateTime<Utc>,
) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        order_type,
        side,
        username,
        quantity,
        created.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn canonical_id_format() {
        let created = DateTime::from_timestamp_millis(1_620_000_000_123).unwrap();
        let id = order_id(OrderType::Limit, Side::Buy, "alice", dec!(2.5), created);
        assert_eq!(id, "limit-buy-alice-2.5-1620000000123");
        assert_eq!(Order::user_from_id(&id), Some("alice"));
    }
}
