//! Request middleware: the `Server-Signature` HMAC predicate, the FireEye
//! admission gate and HTTP metrics.

use axum::body::{to_bytes, Body};
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Instant;

use super::response::ApiError;
use crate::engine::ExchangeError;
use crate::metrics;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Does `signature_hex` equal HMAC-SHA256(body, key)? Verification is
/// constant-time.
pub fn verify_signature(key: &[u8], signature_hex: &str, body: &[u8]) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Server-to-server HMAC authentication. Bypassed in test mode.
pub async fn server_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.config.is_test() {
        return next.run(request).await;
    }

    let Some(signature) = request
        .headers()
        .get("Server-Signature")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
    else {
        return ApiError::bad_request("missing Server-Signature header").into_response();
    };

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => return ApiError::bad_request(err.to_string()).into_response(),
    };

    if !verify_signature(state.config.server_auth.as_bytes(), &signature, &bytes) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

/// Reject state-mutating requests while reconciliation reports the exchange
/// unavailable or out of sync (codes >= 20).
pub async fn fireeye_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.fireeye.gate_open() {
        let status = state.fireeye.status();
        return ApiError::from(ExchangeError::GateClosed(status.message)).into_response();
    }
    next.run(request).await
}

/// Record request count and latency for every route.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let key = b"server-auth-key";
        let body = br#"{"orderID":"limit-buy-alice-2-1620000000000"}"#;

        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(verify_signature(key, &signature, body));
        assert!(!verify_signature(key, &signature, b"tampered"));
        assert!(!verify_signature(b"wrong-key", &signature, body));
        assert!(!verify_signature(key, "not-hex", body));
    }
}
