//! Store error types

use thiserror::Error;

/// Errors from the ledger store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Insufficient balance: have {available}, need {requested}")]
    InsufficientBalance { available: u32, requested: u32 },

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
