//! Product repository

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;
use vitrina_types::{Product, ProductId};

use crate::error::{StoreError, StoreResult};
use crate::models::ProductRow;
use crate::repos::fmt_ts;

const PRODUCT_COLUMNS: &str = "id, sku, name, description, created_at";

/// Product repository - static reference data
pub struct ProductRepo {
    pool: SqlitePool,
}

impl ProductRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a product
    pub async fn create(
        &self,
        sku: &str,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<Product> {
        let id = Uuid::new_v4();
        let created_at = fmt_ts(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(id.to_string())
        .bind(sku)
        .bind(name)
        .bind(description)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return StoreError::Duplicate(format!("SKU {sku} already exists"));
                }
            }
            StoreError::Query(e)
        })?;

        self.by_id(ProductId(id))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("product {id} after insert")))
    }

    /// All products, ordered by name
    pub async fn all(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name"),
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Find a product by id
    pub async fn by_id(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Find a product by display name (selection-step matching)
    pub async fn by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE name = ?1"),
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Find a product by SKU
    pub async fn by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"),
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }
}
