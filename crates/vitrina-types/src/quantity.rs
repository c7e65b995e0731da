//! Quantity validation
//!
//! Every movement carries a positive quantity bounded by [`MAX_QUANTITY`].
//! Free-text quantity input is validated here so the flow controller and
//! the engine agree on the rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling for a single movement's quantity
pub const MAX_QUANTITY: u32 = 10_000;

/// Why a quantity was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum QuantityError {
    /// Input did not parse as an integer
    #[error("quantity is not a number")]
    NotANumber,

    /// Parsed value was zero or negative
    #[error("quantity must be positive")]
    NotPositive,

    /// Parsed value exceeded the hard ceiling
    #[error("quantity exceeds the maximum of {MAX_QUANTITY}")]
    TooLarge,
}

/// Parse free-text quantity input: a positive integer in `1..=MAX_QUANTITY`.
pub fn parse_quantity(input: &str) -> Result<u32, QuantityError> {
    let trimmed = input.trim();
    // i64 first so "-3" reports NotPositive, not NotANumber
    let value: i64 = trimmed.parse().map_err(|_| QuantityError::NotANumber)?;
    if value <= 0 {
        return Err(QuantityError::NotPositive);
    }
    if value > MAX_QUANTITY as i64 {
        return Err(QuantityError::TooLarge);
    }
    Ok(value as u32)
}
