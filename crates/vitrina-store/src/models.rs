//! Row models - mapped from SQLite tables
//!
//! IDs, enums and timestamps are stored as TEXT and converted to the
//! strongly typed domain structs on the way out; a row that fails to
//! convert reports [`StoreError::Corrupt`] rather than panicking.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use vitrina_types::{
    Balance, BalanceId, ChatId, Language, MovementKind, Product, ProductId, Role, Transaction,
    TransactionId, TransactionStatus, User, UserId,
};

use crate::error::StoreError;

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("{field}: {e}")))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{field}: {e}")))
}

fn parse_quantity(field: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field}: negative ({value})")))
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub chat_id: i64,
    pub username: String,
    pub role: String,
    pub language: String,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, StoreError> {
        Ok(User {
            id: UserId(parse_uuid("users.id", &row.id)?),
            chat_id: ChatId(row.chat_id),
            role: Role::from_str_opt(&row.role)
                .ok_or_else(|| StoreError::Corrupt(format!("users.role: {}", row.role)))?,
            language: Language::from_code(&row.language)
                .ok_or_else(|| StoreError::Corrupt(format!("users.language: {}", row.language)))?,
            created_at: parse_timestamp("users.created_at", &row.created_at)?,
            username: row.username,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, StoreError> {
        Ok(Product {
            id: ProductId(parse_uuid("products.id", &row.id)?),
            created_at: parse_timestamp("products.created_at", &row.created_at)?,
            sku: row.sku,
            name: row.name,
            description: row.description,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct BalanceRow {
    pub id: String,
    pub vitrine_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub updated_at: String,
}

impl TryFrom<BalanceRow> for Balance {
    type Error = StoreError;

    fn try_from(row: BalanceRow) -> Result<Self, StoreError> {
        Ok(Balance {
            id: BalanceId(parse_uuid("balances.id", &row.id)?),
            vitrine_id: UserId(parse_uuid("balances.vitrine_id", &row.vitrine_id)?),
            product_id: ProductId(parse_uuid("balances.product_id", &row.product_id)?),
            quantity: parse_quantity("balances.quantity", row.quantity)?,
            updated_at: parse_timestamp("balances.updated_at", &row.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub kind: String,
    pub product_id: String,
    pub quantity: i64,
    pub from_vitrine_id: Option<String>,
    pub to_vitrine_id: Option<String>,
    pub admin_id: Option<String>,
    pub status: String,
    pub needs_confirmation: i64,
    pub confirmed_by: Option<String>,
    pub created_at: String,
}

fn parse_opt_user(field: &str, value: Option<String>) -> Result<Option<UserId>, StoreError> {
    value
        .map(|v| parse_uuid(field, &v).map(UserId))
        .transpose()
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, StoreError> {
        Ok(Transaction {
            id: TransactionId(parse_uuid("transactions.id", &row.id)?),
            kind: MovementKind::from_str_opt(&row.kind)
                .ok_or_else(|| StoreError::Corrupt(format!("transactions.kind: {}", row.kind)))?,
            product_id: ProductId(parse_uuid("transactions.product_id", &row.product_id)?),
            quantity: parse_quantity("transactions.quantity", row.quantity)?,
            from_vitrine_id: parse_opt_user("transactions.from_vitrine_id", row.from_vitrine_id)?,
            to_vitrine_id: parse_opt_user("transactions.to_vitrine_id", row.to_vitrine_id)?,
            admin_id: parse_opt_user("transactions.admin_id", row.admin_id)?,
            status: TransactionStatus::from_str_opt(&row.status).ok_or_else(|| {
                StoreError::Corrupt(format!("transactions.status: {}", row.status))
            })?,
            needs_confirmation: row.needs_confirmation != 0,
            confirmed_by: parse_opt_user("transactions.confirmed_by", row.confirmed_by)?,
            created_at: parse_timestamp("transactions.created_at", &row.created_at)?,
        })
    }
}
