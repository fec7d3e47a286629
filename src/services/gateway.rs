//! BitClout node gateway: the REST client used to read custody wallet
//! balances, plus the background monitor that polls every custody wallet on
//! a spaced cadence to stay inside the node's rate limits.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::db::wallets;
use crate::units;

/// Delay between consecutive wallet balance requests.
const REQUEST_SPACING: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("node request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct WalletBalanceRequest<'a> {
    #[serde(rename = "PublicKeyBase58Check")]
    public_key: &'a str,
    #[serde(rename = "Confirmations")]
    confirmations: i64,
}

#[derive(Debug, Deserialize)]
pub struct WalletBalanceResponse {
    #[serde(rename = "ConfirmedBalanceNanos")]
    pub confirmed_balance_nanos: u64,
    #[serde(rename = "UnconfirmedBalanceNanos")]
    pub unconfirmed_balance_nanos: u64,
}

impl WalletBalanceResponse {
    pub fn total_nanos(&self) -> u64 {
        self.confirmed_balance_nanos + self.unconfirmed_balance_nanos
    }
}

#[derive(Clone)]
pub struct NodeClient {
    base_url: String,
    client: reqwest::Client,
}

impl NodeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn wallet_balance(
        &self,
        public_key: &str,
        confirmations: i64,
    ) -> Result<WalletBalanceResponse, GatewayError> {
        let url = format!("{}/api/v1/balance", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&WalletBalanceRequest {
                public_key,
                confirmations,
            })
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }
}

/// Poll every custody wallet on a fixed cadence, spacing requests so the
/// node API is not overwhelmed. Balances above the swept-fee watermark are
/// surfaced for the (external) deposit sweeper.
pub fn spawn_wallet_monitor(pool: PgPool, node: Arc<NodeClient>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let wallet_list = match wallets::get_all(&pool).await {
                Ok(list) => list,
                Err(err) => {
                    tracing::error!("wallet query failed: {}", err);
                    continue;
                }
            };
            for wallet in wallet_list {
                tokio::time::sleep(REQUEST_SPACING).await;
                match node.wallet_balance(&wallet.public_key, 0).await {
                    Ok(balance) => {
                        let unswept =
                            rust_decimal::Decimal::from(balance.total_nanos()) - wallet.swept_fees_nanos;
                        if unswept > rust_decimal::Decimal::from(1000u32) {
                            tracing::info!(
                                "wallet {} holds {} unswept BCLT",
                                wallet.public_key,
                                units::from_nanos(unswept)
                            );
                        }
                    }
                    Err(err) => {
                        tracing::warn!("balance query failed for {}: {}", wallet.public_key, err);
                    }
                }
            }
        }
    });
}
