#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::units;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub public_key: String,
    pub bitclout_nanos: Decimal,
    pub ether_wei: Decimal,
    pub usdc_micro: Decimal,
    pub in_transaction: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn balance(&self) -> UserBalance {
        UserBalance {
            bitclout_nanos: self.bitclout_nanos,
            ether_wei: self.ether_wei,
            usdc_micro: self.usdc_micro,
            in_transaction: self.in_transaction,
        }
    }
}

/// A user's two-currency (plus USDC) balance in integer base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBalance {
    pub bitclout_nanos: Decimal,
    pub ether_wei: Decimal,
    pub usdc_micro: Decimal,
    pub in_transaction: bool,
}

impl UserBalance {
    pub fn bitclout(&self) -> Decimal {
        units::from_nanos(self.bitclout_nanos)
    }

    pub fn ether(&self) -> Decimal {
        units::from_wei(self.ether_wei)
    }

    pub fn usdc(&self) -> Decimal {
        units::from_micro(self.usdc_micro)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn balance_exposes_human_units() {
        let balance = UserBalance {
            bitclout_nanos: dec!(2500000000),
            ether_wei: dec!(500000000000000000),
            usdc_micro: dec!(1000000),
            in_transaction: false,
        };
        assert_eq!(balance.bitclout(), dec!(2.5));
        assert_eq!(balance.ether(), dec!(0.5));
        assert_eq!(balance.usdc(), dec!(1));
    }
}
