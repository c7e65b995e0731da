//! Per-vitrine product balances

use crate::{BalanceId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-hand quantity of one product at one vitrine.
///
/// Unique per `(vitrine_id, product_id)`; created lazily on the first
/// inbound movement and never deleted. The quantity is kept non-negative
/// by the guarded debit in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub id: BalanceId,
    pub vitrine_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub updated_at: DateTime<Utc>,
}
