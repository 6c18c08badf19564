/// User model and database operations
///
/// Users carry a global role (`user`, `admin`, `support`) that is distinct
/// from their per-company membership role. Banning is a soft deactivation
/// (`active = false`); rows are only removed by an explicit admin delete.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(64) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     role TEXT NOT NULL DEFAULT 'user',
///     active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use companysync_shared::models::user::{CreateUser, GlobalRole, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     username: "jane".to_string(),
///     email: "jane@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: GlobalRole::User,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "JANE@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use super::page::{Page, Pagination};

/// Global (application-wide) role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    /// Regular account
    User,

    /// Access to the admin panel
    Admin,

    /// Answers support chat
    Support,
}

impl GlobalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::User => "user",
            GlobalRole::Admin => "admin",
            GlobalRole::Support => "support",
        }
    }

    /// Admins and support agents both staff the support chat
    pub fn is_support_staff(&self) -> bool {
        matches!(self, GlobalRole::Admin | GlobalRole::Support)
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    pub username: String,

    /// Always stored lowercase
    pub email: String,

    /// Argon2id PHC string; never serialized to clients
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: GlobalRole,

    /// False once banned
    pub active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: GlobalRole,
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, active, created_at, updated_at, last_login_at";

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if the username or email is taken.
    pub async fn create(executor: impl PgExecutor<'_>, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, role)
             VALUES ($1, LOWER($2), $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email (case-insensitive)
    pub async fn find_by_email(
        executor: impl PgExecutor<'_>,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(executor)
        .await
    }

    /// Checks whether a username is already taken
    pub async fn username_exists(
        executor: impl PgExecutor<'_>,
        username: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(executor)
            .await
    }

    pub async fn update_last_login(executor: impl PgExecutor<'_>, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Sets the active flag (ban / unban)
    ///
    /// Returns the updated user, or `None` if no such user exists.
    pub async fn set_active(
        executor: impl PgExecutor<'_>,
        id: i64,
        active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET active = $2, updated_at = NOW() WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(executor)
        .await
    }

    /// Changes the global role
    pub async fn set_role(
        executor: impl PgExecutor<'_>,
        id: i64,
        role: GlobalRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(executor)
        .await
    }

    /// Hard-deletes a user; memberships and sessions cascade
    ///
    /// Returns true if a row was deleted.
    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users for the admin panel, newest first
    ///
    /// `search` matches username or email as a case-insensitive substring.
    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        pagination: Pagination,
    ) -> Result<Page<Self>, sqlx::Error> {
        let pattern = search.map(super::page::like_pattern);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
             WHERE $1::TEXT IS NULL OR username ILIKE $1 OR email ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;

        let items = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE $1::TEXT IS NULL OR username ILIKE $1 OR email ILIKE $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(pattern.as_deref())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(items, total, pagination))
    }
}
