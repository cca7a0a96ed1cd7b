//! Error handling for cookierelay

use thiserror::Error;

/// Main error type for cookierelay operations
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Cookie store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Cookie store schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out waiting for cookies")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for cookierelay operations
pub type Result<T> = std::result::Result<T, RelayError>;
