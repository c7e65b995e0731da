//! Audit errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;
