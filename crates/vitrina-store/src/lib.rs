//! Vitrina Ledger Store
//!
//! Persistence for the inventory tracker on a single embedded SQLite
//! database: `users`, `products`, `balances` and `transactions` tables.
//!
//! # Repository Pattern
//!
//! Each table has its own repository with CRUD and domain-specific
//! queries. All repositories use runtime-checked sqlx queries.
//!
//! # Invariants enforced here
//!
//! - `balances.quantity` never goes negative: debits are guarded and fail
//!   with [`StoreError::InsufficientBalance`]
//! - the debit/credit pair of a transfer runs inside one database
//!   transaction: both sides commit or neither does

pub mod error;
pub mod models;
pub mod repos;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;
use vitrina_types::{ChatId, Language, Role};

pub use error::{StoreError, StoreResult};
pub use repos::{BalanceRepo, ProductRepo, TransactionRepo, UserRepo};

/// Handle to the embedded database
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite://vitrina.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connection(format!("{url}: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(format!("{url}: {e}")))?;

        info!("Connected to SQLite at {url}");
        Ok(Self { pool })
    }

    /// Create the tables if they do not exist yet
    pub async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                chat_id INTEGER NOT NULL UNIQUE,
                username TEXT NOT NULL,
                role TEXT NOT NULL,
                language TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                sku TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balances (
                id TEXT PRIMARY KEY,
                vitrine_id TEXT NOT NULL REFERENCES users(id),
                product_id TEXT NOT NULL REFERENCES products(id),
                quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
                updated_at TEXT NOT NULL,
                UNIQUE (vitrine_id, product_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                product_id TEXT NOT NULL REFERENCES products(id),
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                from_vitrine_id TEXT REFERENCES users(id),
                to_vitrine_id TEXT REFERENCES users(id),
                admin_id TEXT REFERENCES users(id),
                status TEXT NOT NULL DEFAULT 'pending',
                needs_confirmation INTEGER NOT NULL DEFAULT 0,
                confirmed_by TEXT REFERENCES users(id),
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Schema checked/created");
        Ok(())
    }

    /// Insert demo products, but only when the products table is empty
    pub async fn seed_products(&self) -> StoreResult<()> {
        let products = self.products();
        if !products.all().await?.is_empty() {
            info!("Products already present, skipping seed");
            return Ok(());
        }

        products
            .create("SKU-001", "Samsung smartphone", Some("Flagship smartphone"))
            .await?;
        products
            .create("SKU-002", "HP laptop", Some("Gaming laptop"))
            .await?;
        products
            .create("SKU-003", "Sony headphones", Some("Wireless headphones"))
            .await?;

        info!("Seeded demo products");
        Ok(())
    }

    /// Make sure every allow-listed chat id has an admin user record.
    ///
    /// Missing users are created; existing users with another role are
    /// upgraded to admin. This is the only place admin records are created
    /// on our side; confirmation routing never creates users.
    pub async fn ensure_admins(
        &self,
        admin_chat_ids: &[ChatId],
        language: Language,
    ) -> StoreResult<usize> {
        let users = self.users();
        let mut created = 0;

        for &chat_id in admin_chat_ids {
            match users.by_chat_id(chat_id).await? {
                Some(user) if user.role != Role::Admin => {
                    users.set_role(user.id, Role::Admin).await?;
                    info!("Upgraded {} to admin", user.username);
                }
                Some(_) => {}
                None => {
                    let username = format!("admin_{}", chat_id.as_i64());
                    users.create(chat_id, &username, Role::Admin, language).await?;
                    created += 1;
                    info!("Created admin record for {chat_id}");
                }
            }
        }

        Ok(created)
    }

    /// User repository
    pub fn users(&self) -> UserRepo {
        UserRepo::new(self.pool.clone())
    }

    /// Product repository
    pub fn products(&self) -> ProductRepo {
        ProductRepo::new(self.pool.clone())
    }

    /// Balance repository
    pub fn balances(&self) -> BalanceRepo {
        BalanceRepo::new(self.pool.clone())
    }

    /// Transaction repository
    pub fn transactions(&self) -> TransactionRepo {
        TransactionRepo::new(self.pool.clone())
    }

    /// Raw pool access for read-side consumers
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
