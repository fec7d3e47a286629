use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use super::{handlers, middleware};
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // state-mutating surface: gated by reconciliation status, HMAC
    // authenticated
    let exchange_routes = Router::new()
        .route("/market/:slippage/:quote", post(handlers::market_order))
        .route("/limit", post(handlers::limit_order))
        .route("/cancel", post(handlers::cancel_order))
        .route("/sanitize", post(handlers::sanitize))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::server_auth,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::fireeye_gate,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/ethusd", get(handlers::eth_usd))
        .route("/market-price/:side/:quantity", get(handlers::market_price))
        .route(
            "/market-quantity/:side/:max_price",
            get(handlers::market_quantity),
        )
        .route("/orderbook-state", get(handlers::orderbook_state))
        .route("/fireeye-state", get(handlers::fireeye_state))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest("/exchange", exchange_routes)
        .layer(axum_middleware::from_fn(middleware::track_metrics))
        .with_state(state)
}
