//! FireEye: the ledger-vs-custody reconciliation monitor.
//!
//! Every cycle it sums ledger balances and cumulative fees per currency,
//! fetches the externally reported custody balances, and grades the
//! deviation into a status code. The code gates admission: anything at or
//! above 20 closes the exchange to new orders.
//!
//! Code bands: 0-9 OK, 10-19 warn (requests still admitted), 20-29
//! unavailable, 30-39 balance out of sync.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::gateway::NodeClient;
use crate::db::{orders, pools, users, wallets};
use crate::metrics;
use crate::units;

/// Deviation from which a currency is flagged as approaching tolerance.
pub const MID_TOLERANCE: f64 = 0.001;
/// Deviation from which a currency is out of sync and the gate closes.
pub const MAX_TOLERANCE: f64 = 0.005;
/// Confirmations required when querying the custody BitClout balance.
pub const BITCLOUT_CONFIRMATIONS: i64 = 0;

#[derive(Debug, Clone, Serialize)]
pub struct FireEyeStatus {
    #[serde(rename = "Code")]
    pub code: i32,
    #[serde(rename = "Message")]
    pub message: String,
}

pub struct FireEye {
    status: RwLock<FireEyeStatus>,
    pool: PgPool,
    node: Arc<NodeClient>,
    /// Pre-existing ledger/custody offsets at deployment time.
    init_bclt_tolerance: f64,
    init_eth_tolerance: f64,
}

impl FireEye {
    pub fn new(
        pool: PgPool,
        node: Arc<NodeClient>,
        init_bclt_tolerance: f64,
        init_eth_tolerance: f64,
    ) -> Self {
        Self {
            status: RwLock::new(FireEyeStatus {
                code: 20,
                message: "Pending initialization".to_string(),
            }),
            pool,
            node,
            init_bclt_tolerance,
            init_eth_tolerance,
        }
    }

    pub fn status(&self) -> FireEyeStatus {
        self.status.read().expect("fireeye lock poisoned").clone()
    }

    pub fn code(&self) -> i32 {
        self.status.read().expect("fireeye lock poisoned").code
    }

    /// New orders are admitted only below code 20.
    pub fn gate_open(&self) -> bool {
        self.code() < 20
    }

    fn set_status(&self, code: i32, message: String) {
        metrics::fireeye_code(code);
        let mut status = self.status.write().expect("fireeye lock poisoned");
        if status.code != code {
            tracing::info!("FireEye status {} -> {}: {}", status.code, code, message);
        }
        status.code = code;
        status.message = message;
    }

    fn set_warn(&self, message: &str) {
        self.set_status(10, message.to_string());
    }

    /// One reconciliation cycle. Fetch failures grade as a transient warning
    /// and leave the previous aggregate standing.
    pub async fn sync_status(&self) {
        match self.compute().await {
            Ok((code, message)) => self.set_status(code, message),
            Err(err) => {
                tracing::warn!("FireEye sync failed: {}", err);
                self.set_warn(&err.to_string());
            }
        }
    }

    async fn compute(&self) -> anyhow::Result<(i32, String)> {
        let (total_nanos, total_wei) = users::total_balances(&self.pool).await?;
        let (fees_bitclout, fees_ether) = orders::total_fees(&self.pool).await?;

        let main_wallet = wallets::get_main(&self.pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("main custody wallet not configured"))?;
        let wallet_balance = self
            .node
            .wallet_balance(&main_wallet.public_key, BITCLOUT_CONFIRMATIONS)
            .await?;
        let wallet_bitclout =
            units::from_nanos(Decimal::from(wallet_balance.total_nanos())).to_f64().unwrap_or(0.0);
        let wallet_ether = units::from_wei(pools::total_eth_wei(&self.pool).await?)
            .to_f64()
            .unwrap_or(0.0);

        let ledger_bitclout = units::from_nanos(total_nanos).to_f64().unwrap_or(0.0)
            + fees_bitclout.to_f64().unwrap_or(0.0)
            + self.init_bclt_tolerance;
        let ledger_ether = units::from_wei(total_wei).to_f64().unwrap_or(0.0)
            + fees_ether.to_f64().unwrap_or(0.0)
            + self.init_eth_tolerance;

        let bitclout_dev = deviation(ledger_bitclout, wallet_bitclout)
            .ok_or_else(|| anyhow::anyhow!("custody BitClout balance reported as zero"))?;
        let ether_dev = deviation(ledger_ether, wallet_ether)
            .ok_or_else(|| anyhow::anyhow!("custody Ether balance reported as zero"))?;

        let (code, message) = grade(bitclout_dev, ether_dev);
        if code != 0 {
            tracing::warn!(
                "FireEye {}: {} (bitclout dev {:.6}, ether dev {:.6})",
                code,
                message,
                bitclout_dev,
                ether_dev
            );
            tracing::warn!(
                "bitclout ledger {} wallet {} | ether ledger {} wallet {}",
                ledger_bitclout,
                wallet_bitclout,
                ledger_ether,
                wallet_ether
            );
        }
        Ok((code, message.to_string()))
    }

    pub fn spawn_sync_loop(self: &Arc<Self>, period: Duration) {
        let fireeye = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                fireeye.sync_status().await;
            }
        });
    }
}

/// Relative deviation of the ledger total against the custody balance. A
/// non-positive custody balance cannot be graded.
pub fn deviation(ledger_total: f64, wallet_balance: f64) -> Option<f64> {
    if wallet_balance <= 0.0 {
        return None;
    }
    Some((ledger_total / wallet_balance - 1.0).abs())
}

/// Grade a pair of per-currency deviations into the status code contract.
pub fn grade(bitclout_dev: f64, ether_dev: f64) -> (i32, &'static str) {
    match (bitclout_dev >= MAX_TOLERANCE, ether_dev >= MAX_TOLERANCE) {
        (true, true) => (33, "Bitclout and Ether balances out of sync."),
        (true, false) => (32, "Bitclout balance out of sync."),
        (false, true) => (31, "Ether balance out of sync."),
        (false, false) => match (bitclout_dev >= MID_TOLERANCE, ether_dev >= MID_TOLERANCE) {
            (true, true) => (13, "Bitclout and Ether balances approaching tolerance."),
            (true, false) => (12, "Bitclout balance approaching tolerance."),
            (false, true) => (11, "Ether balance approaching tolerance."),
            (false, false) => (0, "OK"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_bands() {
        assert_eq!(grade(0.0, 0.0).0, 0);
        assert_eq!(grade(0.0001, 0.0004).0, 0);
        // mid tolerance
        assert_eq!(grade(0.002, 0.0).0, 12);
        assert_eq!(grade(0.0, 0.002).0, 11);
        assert_eq!(grade(0.002, 0.003).0, 13);
        // out of sync
        assert_eq!(grade(0.006, 0.0).0, 32);
        assert_eq!(grade(0.0, 0.9).0, 31);
        assert_eq!(grade(0.01, 0.01).0, 33);
        // one out, one mid: the out-of-sync code wins
        assert_eq!(grade(0.006, 0.002).0, 32);
    }

    #[test]
    fn deviation_is_relative() {
        assert_eq!(deviation(100.0, 100.0), Some(0.0));
        let dev = deviation(100.5, 100.0).unwrap();
        assert!((dev - 0.005).abs() < 1e-12);
        assert!(deviation(100.0, 0.0).is_none());
    }

    #[test]
    fn boundary_is_inclusive() {
        assert_eq!(grade(MAX_TOLERANCE, 0.0).0, 32);
        assert_eq!(grade(MID_TOLERANCE, 0.0).0, 12);
    }
}
