//! Balance repository
//!
//! Credits upsert the `(vitrine, product)` row; debits are guarded so a
//! balance can never go negative. The debit/credit pair of a transfer is
//! one database transaction.

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;
use vitrina_types::{Balance, ProductId, UserId};

use crate::error::{StoreError, StoreResult};
use crate::models::BalanceRow;
use crate::repos::fmt_ts;

const BALANCE_COLUMNS: &str = "id, vitrine_id, product_id, quantity, updated_at";

/// Balance repository
pub struct BalanceRepo {
    pool: SqlitePool,
}

impl BalanceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The balance row for one `(vitrine, product)` pair, if it exists
    pub async fn get(&self, vitrine: UserId, product: ProductId) -> StoreResult<Option<Balance>> {
        let row = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balances WHERE vitrine_id = ?1 AND product_id = ?2"
        ))
        .bind(vitrine.0.to_string())
        .bind(product.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Balance::try_from).transpose()
    }

    /// Current quantity, zero when no row exists yet
    pub async fn quantity(&self, vitrine: UserId, product: ProductId) -> StoreResult<u32> {
        Ok(self.get(vitrine, product).await?.map(|b| b.quantity).unwrap_or(0))
    }

    /// All balance rows of a vitrine, including empty ones
    pub async fn for_vitrine(&self, vitrine: UserId) -> StoreResult<Vec<Balance>> {
        let rows = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balances WHERE vitrine_id = ?1 ORDER BY updated_at"
        ))
        .bind(vitrine.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Balance::try_from).collect()
    }

    /// Balance rows of a vitrine with stock on hand
    pub async fn with_stock(&self, vitrine: UserId) -> StoreResult<Vec<Balance>> {
        let rows = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT {BALANCE_COLUMNS} FROM balances \
             WHERE vitrine_id = ?1 AND quantity > 0 ORDER BY updated_at"
        ))
        .bind(vitrine.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Balance::try_from).collect()
    }

    /// Credit `quantity` to a vitrine's balance, creating the row if
    /// absent. Returns the new quantity.
    pub async fn credit(
        &self,
        vitrine: UserId,
        product: ProductId,
        quantity: u32,
    ) -> StoreResult<u32> {
        let mut tx = self.pool.begin().await?;
        let new_quantity = Self::credit_on(&mut tx, vitrine, product, quantity).await?;
        tx.commit().await?;
        Ok(new_quantity)
    }

    /// Debit `quantity` from a vitrine's balance. Fails with
    /// [`StoreError::InsufficientBalance`] when the row is missing or too
    /// small; the row is left untouched in that case.
    pub async fn debit(
        &self,
        vitrine: UserId,
        product: ProductId,
        quantity: u32,
    ) -> StoreResult<u32> {
        let mut tx = self.pool.begin().await?;
        let new_quantity = Self::debit_on(&mut tx, vitrine, product, quantity).await?;
        tx.commit().await?;
        Ok(new_quantity)
    }

    /// Move `quantity` from one vitrine to another as a single database
    /// transaction: both sides commit or neither does. Returns the new
    /// `(source, target)` quantities.
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        product: ProductId,
        quantity: u32,
    ) -> StoreResult<(u32, u32)> {
        let mut tx = self.pool.begin().await?;
        let from_quantity = Self::debit_on(&mut tx, from, product, quantity).await?;
        let to_quantity = Self::credit_on(&mut tx, to, product, quantity).await?;
        tx.commit().await?;
        Ok((from_quantity, to_quantity))
    }

    async fn credit_on(
        conn: &mut SqliteConnection,
        vitrine: UserId,
        product: ProductId,
        quantity: u32,
    ) -> StoreResult<u32> {
        let updated_at = fmt_ts(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO balances (id, vitrine_id, product_id, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (vitrine_id, product_id)
            DO UPDATE SET quantity = quantity + excluded.quantity,
                          updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(vitrine.0.to_string())
        .bind(product.0.to_string())
        .bind(quantity as i64)
        .bind(&updated_at)
        .execute(&mut *conn)
        .await?;

        Self::quantity_on(conn, vitrine, product).await
    }

    pub(crate) async fn debit_on(
        conn: &mut SqliteConnection,
        vitrine: UserId,
        product: ProductId,
        quantity: u32,
    ) -> StoreResult<u32> {
        let updated_at = fmt_ts(Utc::now());

        let result = sqlx::query(
            r#"
            UPDATE balances SET quantity = quantity - ?1, updated_at = ?2
            WHERE vitrine_id = ?3 AND product_id = ?4 AND quantity >= ?1
            "#,
        )
        .bind(quantity as i64)
        .bind(&updated_at)
        .bind(vitrine.0.to_string())
        .bind(product.0.to_string())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let available = Self::quantity_on(conn, vitrine, product).await?;
            return Err(StoreError::InsufficientBalance {
                available,
                requested: quantity,
            });
        }

        Self::quantity_on(conn, vitrine, product).await
    }

    async fn quantity_on(
        conn: &mut SqliteConnection,
        vitrine: UserId,
        product: ProductId,
    ) -> StoreResult<u32> {
        let row = sqlx::query(
            "SELECT quantity FROM balances WHERE vitrine_id = ?1 AND product_id = ?2",
        )
        .bind(vitrine.0.to_string())
        .bind(product.0.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let quantity: i64 = row.try_get("quantity")?;
                u32::try_from(quantity)
                    .map_err(|_| StoreError::Corrupt(format!("balances.quantity: {quantity}")))
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use vitrina_types::{ChatId, Language, Role};

    async fn fixture() -> (Store, UserId, UserId, ProductId) {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();

        let a = store
            .users()
            .create(ChatId(1), "a", Role::Vitrine, Language::Ru)
            .await
            .unwrap();
        let b = store
            .users()
            .create(ChatId(2), "b", Role::Vitrine, Language::Ru)
            .await
            .unwrap();
        let p = store.products().create("SKU-1", "Widget", None).await.unwrap();

        (store, a.id, b.id, p.id)
    }

    #[tokio::test]
    async fn credit_creates_row_lazily() {
        let (store, a, _, p) = fixture().await;
        let balances = store.balances();

        assert_eq!(balances.quantity(a, p).await.unwrap(), 0);
        assert_eq!(balances.credit(a, p, 5).await.unwrap(), 5);
        assert_eq!(balances.credit(a, p, 3).await.unwrap(), 8);
        assert_eq!(balances.quantity(a, p).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn debit_is_guarded() {
        let (store, a, _, p) = fixture().await;
        let balances = store.balances();

        balances.credit(a, p, 4).await.unwrap();
        let err = balances.debit(a, p, 5).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientBalance { available: 4, requested: 5 }
        ));
        // untouched after the failed debit
        assert_eq!(balances.quantity(a, p).await.unwrap(), 4);

        assert_eq!(balances.debit(a, p, 4).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn debit_missing_row_reports_zero_available() {
        let (store, a, _, p) = fixture().await;
        let err = store.balances().debit(a, p, 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientBalance { available: 0, requested: 1 }
        ));
    }

    #[tokio::test]
    async fn transfer_moves_stock_atomically() {
        let (store, a, b, p) = fixture().await;
        let balances = store.balances();

        balances.credit(a, p, 10).await.unwrap();
        let (from_q, to_q) = balances.transfer(a, b, p, 4).await.unwrap();
        assert_eq!((from_q, to_q), (6, 4));

        // conservation
        let total =
            balances.quantity(a, p).await.unwrap() + balances.quantity(b, p).await.unwrap();
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn failed_transfer_touches_neither_side() {
        let (store, a, b, p) = fixture().await;
        let balances = store.balances();

        balances.credit(a, p, 3).await.unwrap();
        let err = balances.transfer(a, b, p, 5).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientBalance { .. }));
        assert_eq!(balances.quantity(a, p).await.unwrap(), 3);
        assert_eq!(balances.quantity(b, p).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn with_stock_filters_empty_rows() {
        let (store, a, _, p) = fixture().await;
        let balances = store.balances();

        balances.credit(a, p, 2).await.unwrap();
        balances.debit(a, p, 2).await.unwrap();
        assert_eq!(balances.for_vitrine(a).await.unwrap().len(), 1);
        assert!(balances.with_stock(a).await.unwrap().is_empty());
    }
}
