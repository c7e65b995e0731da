//! Engine errors

use thiserror::Error;
use vitrina_store::StoreError;
use vitrina_types::QuantityError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: u32, requested: u32 },

    #[error("movement is missing a party: {0}")]
    MissingParty(&'static str),

    #[error("transfer source and target must differ")]
    SameVitrine,

    #[error("movement {0} is not in a state this operation accepts")]
    WrongState(&'static str),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientBalance { available, requested } => {
                EngineError::InsufficientStock { available, requested }
            }
            other => EngineError::Store(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
