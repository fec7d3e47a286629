use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_side", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
        }
    }
}

/// Ledger row for an order. Created at admission, mutated on every fill and
/// on cancel, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderDocument {
    pub id: Uuid,
    pub order_id: String,
    pub username: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Limit price; NULL for market orders.
    pub price: Option<Decimal>,
    /// Cumulative filled quantity, monotonically non-decreasing.
    pub quantity_processed: Decimal,
    /// Volume-weighted average executed price.
    pub exec_price: Option<Decimal>,
    /// Cumulative Ether moved by fills of this order (human units).
    pub ether_quantity: Decimal,
    /// Cumulative fees in the currency this order's owner receives.
    pub fees: Decimal,
    pub complete: bool,
    pub complete_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderDocument {
    pub fn new(
        order_id: String,
        username: String,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Decimal>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            username,
            side,
            order_type,
            quantity,
            price,
            quantity_processed: Decimal::ZERO,
            exec_price: None,
            ether_quantity: Decimal::ZERO,
            fees: Decimal::ZERO,
            complete: false,
            complete_time: None,
            error: None,
            created_at,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.quantity - self.quantity_processed
    }
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("positive"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LimitOrderRequest {
    pub username: String,
    #[serde(rename = "orderSide")]
    pub order_side: String,
    #[serde(rename = "orderQuantity")]
    #[validate(custom = "positive")]
    pub order_quantity: Decimal,
    #[serde(rename = "orderPrice")]
    #[validate(custom = "positive")]
    pub order_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MarketOrderRequest {
    pub username: String,
    #[serde(rename = "orderSide")]
    pub order_side: String,
    #[serde(rename = "orderQuantity")]
    #[validate(custom = "positive")]
    pub order_quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_round_trips_through_str() {
        assert_eq!("buy".parse::<Side>(), Ok(Side::Buy));
        assert_eq!("sell".parse::<Side>(), Ok(Side::Sell));
        assert!("hold".parse::<Side>().is_err());
        assert_eq!(Side::Buy.to_string(), "buy");
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn limit_request_rejects_non_positive_values() {
        let req = LimitOrderRequest {
            username: "alice".into(),
            order_side: "buy".into(),
            order_quantity: dec!(0),
            order_price: dec!(100),
        };
        assert!(req.validate().is_err());

        let req = LimitOrderRequest {
            order_quantity: dec!(2),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn document_remaining_tracks_processed() {
        let mut doc = OrderDocument::new(
            "limit-buy-alice-2-0".into(),
            "alice".into(),
            Side::Buy,
            OrderType::Limit,
            dec!(2),
            Some(dec!(100)),
            Utc::now(),
        );
        assert_eq!(doc.remaining(), dec!(2));
        doc.quantity_processed = dec!(1.5);
        assert_eq!(doc.remaining(), dec!(0.5));
    }
}
