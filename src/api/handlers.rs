//! Route handlers for the exchange surface.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

use super::response::ApiError;
use crate::engine::ExchangeError;
use crate::models::{
    CancelOrderRequest, LimitOrderRequest, MarketOrderRequest, SanitizeRequest, Side,
};
use crate::orderbook::DepthSnapshot;
use crate::services::fireeye::FireEyeStatus;
use crate::AppState;

fn parse_side(side: &str) -> Result<Side, ApiError> {
    side.parse()
        .map_err(|_| ApiError::from(ExchangeError::InvalidSide))
}

fn parse_decimal(value: &str, err: ExchangeError) -> Result<Decimal, ApiError> {
    Decimal::from_str(value).map_err(|_| ApiError::from(err))
}

/// Run a state-mutating step on a detached task. A dropped connection
/// cancels the handler future, but matching must run to completion or to a
/// clean error so the book is never left torn.
async fn run_to_completion<T, F>(step: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ExchangeError>> + Send + 'static,
{
    tokio::spawn(step)
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .map_err(ApiError::from)
}

pub async fn root() -> &'static str {
    "Bitswap Exchange Manager"
}

pub async fn eth_usd(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let rate = state
        .oracle
        .eth_usd()
        .map_err(|err| ExchangeError::Upstream(err.to_string()))?;
    Ok(Json(json!({ "result": rate.to_f64() })))
}

pub async fn market_price(
    State(state): State<Arc<AppState>>,
    Path((side, quantity)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let order_side = parse_side(&side)?;
    let quantity = parse_decimal(&quantity, ExchangeError::InvalidQuantity)?;
    let price = state
        .exchange
        .calculate_market_price(order_side, quantity)
        .await?;
    Ok(Json(json!({
        "quantity": quantity.to_f64(),
        "price": price.to_f64(),
        "side": side,
    })))
}

pub async fn market_quantity(
    State(state): State<Arc<AppState>>,
    Path((side, max_price)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let order_side = parse_side(&side)?;
    let max_price = parse_decimal(&max_price, ExchangeError::InvalidPrice)?;
    let quantity = state
        .exchange
        .calculate_market_quantity(order_side, max_price)
        .await?;
    Ok(Json(json!({
        "quantity": quantity.to_f64(),
        "side": side,
    })))
}

pub async fn orderbook_state(State(state): State<Arc<AppState>>) -> Json<DepthSnapshot> {
    Json(state.exchange.depth().await)
}

pub async fn fireeye_state(State(state): State<Arc<AppState>>) -> Json<FireEyeStatus> {
    Json(state.fireeye.status())
}

pub async fn market_order(
    State(state): State<Arc<AppState>>,
    Path((slippage, quote)): Path<(String, String)>,
    Json(req): Json<MarketOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    req.validate()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    let slippage = parse_decimal(&slippage, ExchangeError::SlippageExceeded)?;
    let quote = parse_decimal(&quote, ExchangeError::SlippageExceeded)?;
    let id = run_to_completion(async move {
        state.exchange.place_market_order(&req, slippage, quote).await
    })
    .await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn limit_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LimitOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    req.validate()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    let id =
        run_to_completion(async move { state.exchange.place_limit_order(&req).await }).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<String, ApiError> {
    let cancelled = run_to_completion(async move {
        state
            .exchange
            .cancel_order(&req.order_id, "Order Cancelled by User")
            .await
    })
    .await?;
    Ok(format!("Cancelled order: {}", cancelled.id))
}

pub async fn sanitize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SanitizeRequest>,
) -> Result<&'static str, ApiError> {
    if req.public_key.is_empty() {
        return Err(ApiError::bad_request("invalid public key"));
    }
    run_to_completion(async move { state.exchange.sanitize_user(&req.public_key).await }).await?;
    Ok("OK")
}

pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
