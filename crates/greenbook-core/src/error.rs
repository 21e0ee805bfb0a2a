//! Error types for greenbook-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid odds: {0}")]
    InvalidOdds(String),

    #[error("Invalid stake: {0}")]
    InvalidStake(String),

    #[error("Invalid market id: {0}")]
    InvalidMarketId(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
