use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod db;
mod engine;
mod ledger;
mod metrics;
mod models;
mod orderbook;
mod services;
mod units;

use crate::config::AppConfig;
use crate::db::Database;
use crate::engine::Exchange;
use crate::ledger::pg::PgLedger;
use crate::orderbook::OrderBook;
use crate::services::fireeye::FireEye;
use crate::services::gateway::{self, NodeClient};
use crate::services::oracle::PriceOracle;
use crate::services::snapshot::{self, FsSnapshotStore};

pub struct AppState {
    pub config: AppConfig,
    pub exchange: Exchange<PgLedger>,
    pub oracle: Arc<PriceOracle>,
    pub fireeye: Arc<FireEye>,
    pub metrics: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bitswap_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!(
        "Starting Bitswap Exchange Manager v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.env_mode);
    if config.wallet_hashkey.is_none() {
        tracing::warn!("WALLET_HASHKEY not configured; deposit sweepers will not run");
    }

    let metrics_handle = metrics::init();

    let db = Database::connect(&config.database_url()).await?;
    db.migrate().await?;
    tracing::info!("Database connected");

    // price oracle: initial fetch, then a 10s refresh loop
    let oracle = Arc::new(PriceOracle::new(config.etherscan_key.clone()));
    match oracle.refresh().await {
        Ok(rate) => tracing::info!("ETHUSD initialized at {}", rate),
        Err(err) => tracing::warn!("initial ETHUSD fetch failed: {}", err),
    }
    oracle.spawn_refresh_loop(Duration::from_secs(10));

    // recover the book from the most recent snapshot, then start the upload
    // worker
    let store = Arc::new(FsSnapshotStore::new(config.snapshot_root()));
    let book = Arc::new(RwLock::new(OrderBook::new()));
    match snapshot::recover(store.as_ref()).await {
        Ok(Some(recovered)) => {
            tracing::info!("Recovered {} resting orders from snapshot", recovered.len());
            *book.write().await = recovered;
        }
        Ok(None) => tracing::info!("No orderbook snapshot found, starting blank"),
        Err(err) => tracing::error!("orderbook recovery failed, starting blank: {}", err),
    }
    let snapshots = snapshot::spawn_snapshot_worker(book.clone(), store, Duration::from_secs(60));

    let ledger = PgLedger::new(db.pool.clone(), config.fee_rate);
    let exchange = Exchange::new(book, ledger, oracle.clone(), snapshots);
    tracing::info!("Matching engine initialized (fee rate {})", config.fee_rate);

    // rows completed right before a crash win over the recovered snapshot
    match exchange.reconcile_recovered().await {
        Ok(0) => {}
        Ok(dropped) => tracing::warn!("dropped {} already-settled residuals", dropped),
        Err(err) => tracing::error!("recovery reconciliation failed: {}", err),
    }

    // reconciliation monitor and custody wallet polling
    let node = Arc::new(NodeClient::new(config.node_url.clone()));
    let fireeye = Arc::new(FireEye::new(
        db.pool.clone(),
        node.clone(),
        config.init_bclt_tolerance,
        config.init_eth_tolerance,
    ));
    fireeye.spawn_sync_loop(Duration::from_secs(5));
    gateway::spawn_wallet_monitor(db.pool.clone(), node, Duration::from_secs(10));

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        exchange,
        oracle,
        fireeye,
        metrics: metrics_handle,
    });

    let app = api::routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
