//! Transaction repository

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::SqliteConnection;
use uuid::Uuid;
use vitrina_types::{
    MovementKind, ProductId, Transaction, TransactionId, TransactionStatus, UserId,
};

use crate::error::{StoreError, StoreResult};
use crate::models::TransactionRow;
use crate::repos::balance::BalanceRepo;
use crate::repos::fmt_ts;

const TX_COLUMNS: &str = "id, kind, product_id, quantity, from_vitrine_id, to_vitrine_id, \
                          admin_id, status, needs_confirmation, confirmed_by, created_at";

/// Fields for a new movement record; status and timestamps are assigned
/// by the repository.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub quantity: u32,
    pub from_vitrine_id: Option<UserId>,
    pub to_vitrine_id: Option<UserId>,
    pub admin_id: Option<UserId>,
    pub status: TransactionStatus,
    pub needs_confirmation: bool,
}

/// Transaction repository
pub struct TransactionRepo {
    pool: SqlitePool,
}

impl TransactionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new movement
    pub async fn create(&self, new: NewTransaction) -> StoreResult<Transaction> {
        let mut tx = self.pool.begin().await?;
        let id = Self::create_on(&mut tx, &new).await?;
        tx.commit().await?;

        self.by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id} after insert")))
    }

    /// Record a self-confirming movement and debit its source balance as
    /// one database transaction: a failed debit leaves no row behind.
    /// Returns the movement and the remaining source quantity.
    pub async fn create_with_debit(
        &self,
        new: NewTransaction,
        source: UserId,
    ) -> StoreResult<(Transaction, u32)> {
        let mut tx = self.pool.begin().await?;
        let id = Self::create_on(&mut tx, &new).await?;
        let remaining =
            BalanceRepo::debit_on(&mut tx, source, new.product_id, new.quantity).await?;
        tx.commit().await?;

        let transaction = self
            .by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id} after insert")))?;
        Ok((transaction, remaining))
    }

    async fn create_on(
        conn: &mut SqliteConnection,
        new: &NewTransaction,
    ) -> StoreResult<TransactionId> {
        let id = Uuid::new_v4();
        let created_at = fmt_ts(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, kind, product_id, quantity, from_vitrine_id, to_vitrine_id,
                 admin_id, status, needs_confirmation, confirmed_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10)
            "#,
        )
        .bind(id.to_string())
        .bind(new.kind.as_str())
        .bind(new.product_id.0.to_string())
        .bind(new.quantity as i64)
        .bind(new.from_vitrine_id.map(|u| u.0.to_string()))
        .bind(new.to_vitrine_id.map(|u| u.0.to_string()))
        .bind(new.admin_id.map(|u| u.0.to_string()))
        .bind(new.status.as_str())
        .bind(new.needs_confirmation as i64)
        .bind(&created_at)
        .execute(&mut *conn)
        .await?;

        Ok(TransactionId(id))
    }

    /// Find a movement by id
    pub async fn by_id(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            &format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = ?1"),
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    /// Set the status, optionally recording who replied.
    ///
    /// The `WHERE status = 'pending'` guard makes the transition
    /// single-shot: a terminal row is never rewritten. Returns false when
    /// the row was not pending (or does not exist).
    pub async fn set_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        confirmed_by: Option<UserId>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET status = ?1, confirmed_by = ?2 \
             WHERE id = ?3 AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(confirmed_by.map(|u| u.0.to_string()))
        .bind(id.0.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Put a confirmed/rejected movement back to pending (mutation
    /// failure rollback in the confirmation workflow)
    pub async fn reset_to_pending(&self, id: TransactionId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE transactions SET status = 'pending', confirmed_by = NULL WHERE id = ?1",
        )
        .bind(id.0.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bind the admin who will confirm a return
    pub async fn set_admin(&self, id: TransactionId, admin: UserId) -> StoreResult<()> {
        sqlx::query("UPDATE transactions SET admin_id = ?1 WHERE id = ?2")
            .bind(admin.0.to_string())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record that the confirmation prompt reached the counterparty
    pub async fn set_needs_confirmation(
        &self,
        id: TransactionId,
        needs_confirmation: bool,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE transactions SET needs_confirmation = ?1 WHERE id = ?2")
            .bind(needs_confirmation as i64)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Discard a movement whose counterparty could not be reached
    pub async fn delete(&self, id: TransactionId) -> StoreResult<()> {
        sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Movements in a date range, newest first
    pub async fn in_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> StoreResult<Vec<Transaction>> {
        // bare `?` placeholders bind in order, whichever filters are set
        let mut sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE 1 = 1");
        if from.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if to.is_some() {
            sql.push_str(" AND created_at <= ?");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, TransactionRow>(&sql);
        if let Some(from) = from {
            query = query.bind(fmt_ts(from));
        }
        if let Some(to) = to {
            query = query.bind(fmt_ts(to));
        }
        if let Some(limit) = limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// All movements touching a vitrine (as source or target)
    pub async fn for_vitrine(&self, vitrine: UserId) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TX_COLUMNS} FROM transactions \
             WHERE from_vitrine_id = ?1 OR to_vitrine_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(vitrine.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }
}
