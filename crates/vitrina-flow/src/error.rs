//! Flow errors
//!
//! These never reach the user directly: the controller catches them, puts
//! them on the audit trail and replies with a generic failure message.

use thiserror::Error;
use vitrina_confirm::ConfirmError;
use vitrina_engine::EngineError;
use vitrina_reports::ReportError;
use vitrina_store::StoreError;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("confirmation error: {0}")]
    Confirm(#[from] ConfirmError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

pub type FlowResult<T> = Result<T, FlowError>;
