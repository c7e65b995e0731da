//! Report errors

use thiserror::Error;
use vitrina_store::StoreError;
use vitrina_types::UserId;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown vitrine {0}")]
    UnknownVitrine(UserId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type ReportResult<T> = Result<T, ReportError>;
