//! ETH→USD price oracle.
//!
//! Polls the Etherscan stats API on a fixed cadence; the last good rate
//! stays in effect across fetch failures. A rate that is missing or
//! non-positive is an error to every consumer, never a divisor.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::metrics;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("exchange rate unavailable")]
    NotReady,
    #[error("oracle request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("oracle returned an unusable rate: {0}")]
    BadRate(String),
}

#[derive(Debug, Deserialize)]
struct EthPriceResponse {
    #[allow(dead_code)]
    status: String,
    #[allow(dead_code)]
    message: String,
    result: EthPriceResult,
}

#[derive(Debug, Deserialize)]
struct EthPriceResult {
    ethusd: String,
}

pub struct PriceOracle {
    rate: RwLock<Option<Decimal>>,
    last_update_ms: AtomicI64,
    client: reqwest::Client,
    api_key: String,
}

impl PriceOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            rate: RwLock::new(None),
            last_update_ms: AtomicI64::new(0),
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Current rate, if one has ever been fetched and is positive.
    pub fn eth_usd(&self) -> Result<Decimal, OracleError> {
        match *self.rate.read().expect("oracle lock poisoned") {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            _ => Err(OracleError::NotReady),
        }
    }

    pub fn last_update_ms(&self) -> i64 {
        self.last_update_ms.load(Ordering::Relaxed)
    }

    /// Install a rate directly. Used at startup before the first fetch lands
    /// and by tests.
    pub fn set_rate(&self, rate: Decimal) {
        *self.rate.write().expect("oracle lock poisoned") = Some(rate);
        self.last_update_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Fetch the rate once. On success the stored rate is replaced; on
    /// failure the previous rate stays in effect.
    pub async fn refresh(&self) -> Result<Decimal, OracleError> {
        let url = format!(
            "https://api.etherscan.io/api?module=stats&action=ethprice&apikey={}",
            self.api_key
        );
        let response: EthPriceResponse = self.client.get(&url).send().await?.json().await?;
        let rate = Decimal::from_str(&response.result.ethusd)
            .map_err(|_| OracleError::BadRate(response.result.ethusd.clone()))?;
        if rate <= Decimal::ZERO {
            return Err(OracleError::BadRate(response.result.ethusd));
        }
        self.set_rate(rate);
        tracing::info!("current ETHUSD price: {}", rate);
        Ok(rate)
    }

    /// Refresh on a fixed cadence for the life of the process.
    pub fn spawn_refresh_loop(self: &Arc<Self>, period: Duration) {
        let oracle = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match oracle.refresh().await {
                    Ok(_) => metrics::oracle_update(true),
                    Err(err) => {
                        metrics::oracle_update(false);
                        tracing::warn!("ETHUSD refresh failed, keeping last rate: {}", err);
                    }
                }
            }
        });
    }
}
