#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "asset_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Eth,
    Bclt,
    Usdc,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Eth => write!(f, "ETH"),
            AssetType::Bclt => write!(f, "BCLT"),
            AssetType::Usdc => write!(f, "USDC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Pending,
    Done,
}

/// Deposit ledger row. One row per on-chain transaction hash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub username: String,
    pub asset_type: AssetType,
    pub value: Decimal,
    pub usd_value_at_time: Decimal,
    pub state: TransactionState,
    pub txn_hash: String,
    pub gas_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Ether custody pool.
#[derive(Debug, Clone, FromRow)]
pub struct Pool {
    pub id: Uuid,
    pub address: String,
    pub eth_wei: Decimal,
    pub usdc_micro: Decimal,
    pub active: bool,
}

/// BitClout custody wallet.
#[derive(Debug, Clone, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub public_key: String,
    pub swept_fees_nanos: Decimal,
    pub is_main: bool,
    pub status: i32,
}
