//! Products - static reference data

use crate::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product that can be held by vitrines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Stock-keeping unit, unique across products
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
