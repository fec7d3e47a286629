use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookError {
    #[error("order already exists: {0}")]
    OrderExists(String),
    #[error("order does not exist: {0}")]
    OrderNotExists(String),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot contains duplicate order id: {0}")]
    DuplicateOrder(String),
}
