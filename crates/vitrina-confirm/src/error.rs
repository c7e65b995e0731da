//! Confirmation workflow errors

use thiserror::Error;
use vitrina_engine::EngineError;
use vitrina_store::StoreError;

#[derive(Debug, Error)]
pub enum ConfirmError {
    /// No counterparty could be resolved for a return; the pending
    /// movement has been discarded.
    #[error("no admin available to confirm the movement")]
    CounterpartyUnavailable,

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type ConfirmResult<T> = Result<T, ConfirmError>;
