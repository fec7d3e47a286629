use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::engine::ExchangeError;
use crate::ledger::LedgerError;

/// An error ready to leave the HTTP boundary as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        let status = match &err {
            ExchangeError::InvalidSide
            | ExchangeError::InvalidQuantity
            | ExchangeError::InvalidPrice
            | ExchangeError::InsufficientBalance
            | ExchangeError::UserInTransaction
            | ExchangeError::MaxActiveOrders
            | ExchangeError::SlippageExceeded => StatusCode::BAD_REQUEST,
            ExchangeError::OrderNotExists => StatusCode::CONFLICT,
            ExchangeError::GateClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            ExchangeError::Ledger(LedgerError::UserNotFound(_)) => StatusCode::BAD_REQUEST,
            ExchangeError::OrderExists
            | ExchangeError::InsufficientQuantity
            | ExchangeError::Upstream(_)
            | ExchangeError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (ExchangeError::InvalidSide, StatusCode::BAD_REQUEST),
            (ExchangeError::InvalidQuantity, StatusCode::BAD_REQUEST),
            (ExchangeError::SlippageExceeded, StatusCode::BAD_REQUEST),
            (ExchangeError::OrderNotExists, StatusCode::CONFLICT),
            (ExchangeError::OrderExists, StatusCode::INTERNAL_SERVER_ERROR),
            (
                ExchangeError::InsufficientQuantity,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ExchangeError::GateClosed("maintenance".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }
}
