/// Application settings (key → JSON value)
///
/// Known keys:
///
/// - `registration_enabled` (bool, default `true`): whether self-service
///   sign-up is open

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgExecutor;

/// Key controlling self-service registration
pub const REGISTRATION_ENABLED: &str = "registration_enabled";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: Value,
    pub updated_by: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl Setting {
    pub async fn list(executor: impl PgExecutor<'_>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_by, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(executor)
        .await
    }

    pub async fn get(executor: impl PgExecutor<'_>, key: &str) -> Result<Option<Value>, sqlx::Error> {
        sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(executor)
            .await
    }

    /// Reads a boolean setting, falling back to `default` when the key is
    /// missing or not a boolean
    pub async fn get_bool(
        executor: impl PgExecutor<'_>,
        key: &str,
        default: bool,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::get(executor, key)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(default))
    }

    /// Inserts or replaces a setting
    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        key: &str,
        value: Value,
        updated_by: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, updated_by, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value,
                    updated_by = EXCLUDED.updated_by,
                    updated_at = EXCLUDED.updated_at
            RETURNING key, value, updated_by, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_by)
        .fetch_one(executor)
        .await
    }
}
