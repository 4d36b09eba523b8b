use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the energy rental service
#[derive(Error, Debug)]
pub enum ErgonError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Order lifecycle errors
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Insufficient balance: need {required} TRX, have {available} TRX")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Chain errors
    #[error("Delegation failed: {0}")]
    Delegation(String),

    #[error("Chain node unavailable: {0}")]
    ChainUnavailable(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ErgonError
pub type Result<T> = std::result::Result<T, ErgonError>;
