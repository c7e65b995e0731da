//! User repository

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;
use vitrina_types::{ChatId, Language, Role, User, UserId};

use crate::error::{StoreError, StoreResult};
use crate::models::UserRow;
use crate::repos::fmt_ts;

const USER_COLUMNS: &str = "id, chat_id, username, role, language, created_at";

/// User repository for registration, directory lookups and preferences
pub struct UserRepo {
    pool: SqlitePool,
}

impl UserRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new user
    pub async fn create(
        &self,
        chat_id: ChatId,
        username: &str,
        role: Role,
        language: Language,
    ) -> StoreResult<User> {
        let id = Uuid::new_v4();
        let created_at = fmt_ts(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO users (id, chat_id, username, role, language, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(id.to_string())
        .bind(chat_id.as_i64())
        .bind(username)
        .bind(role.as_str())
        .bind(language.code())
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return StoreError::Duplicate(format!("chat id {} already registered", chat_id));
                }
            }
            StoreError::Query(e)
        })?;

        self.by_id(UserId(id))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {id} after insert")))
    }

    /// Find a user by internal id
    pub async fn by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Find a user by chat-platform identity
    pub async fn by_chat_id(&self, chat_id: ChatId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?1"),
        )
        .bind(chat_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Find a vitrine by display name (selection-step matching)
    pub async fn vitrine_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 AND role = 'vitrine'"),
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// All vitrines, ordered by name
    pub async fn vitrines(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE role = 'vitrine' ORDER BY username"),
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// All vitrines except one (transfer target candidates)
    pub async fn vitrines_except(&self, excluded: UserId) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = 'vitrine' AND id != ?1 ORDER BY username"
        ))
        .bind(excluded.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// All admins, oldest first.
    ///
    /// The ordering is the confirmation-routing priority for returns.
    pub async fn admins(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE role = 'admin' ORDER BY created_at"),
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// Change a user's language preference
    pub async fn set_language(&self, id: UserId, language: Language) -> StoreResult<()> {
        sqlx::query("UPDATE users SET language = ?1 WHERE id = ?2")
            .bind(language.code())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Change a user's role (allow-list upgrade, password-gate grant)
    pub async fn set_role(&self, id: UserId, role: Role) -> StoreResult<()> {
        sqlx::query("UPDATE users SET role = ?1 WHERE id = ?2")
            .bind(role.as_str())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
