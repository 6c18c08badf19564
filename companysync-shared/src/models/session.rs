/// Login session model
///
/// Only the SHA-256 hex digest of a session token is stored. A session is
/// valid while `revoked = false` and `expires_at > NOW()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// Session row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Session {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, created_at, expires_at, revoked
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }

    /// Finds a live (unrevoked, unexpired) session by token hash
    pub async fn find_active(
        executor: impl PgExecutor<'_>,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at, revoked
            FROM sessions
            WHERE token_hash = $1 AND NOT revoked AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(executor)
        .await
    }

    /// Revokes one session (logout)
    pub async fn revoke(executor: impl PgExecutor<'_>, token_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET revoked = TRUE WHERE token_hash = $1 AND NOT revoked")
            .bind(token_hash)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every session of a user (ban); returns the number revoked
    pub async fn revoke_all_for_user(executor: impl PgExecutor<'_>, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET revoked = TRUE WHERE user_id = $1 AND NOT revoked")
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
