/// Support chat messages
///
/// Each user has one thread, keyed by `user_id`. Messages written by
/// support staff carry `from_support = true`. A message is unread until the
/// other side opens the thread.
///
/// Messages expire after [`SUPPORT_RETENTION_DAYS`], but only when a staff member
/// calls [`SupportMessage::purge_expired`]; nothing deletes them in the
/// background.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// How long support messages are kept
pub const SUPPORT_RETENTION_DAYS: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupportMessage {
    pub id: i64,
    /// Thread owner
    pub user_id: i64,
    pub sender_id: Option<i64>,
    pub from_support: bool,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One thread in the staff inbox
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupportThread {
    pub user_id: i64,
    pub username: String,
    pub last_message_at: DateTime<Utc>,
    pub message_count: i64,
    /// User messages staff has not read yet
    pub unread: i64,
}

impl SupportMessage {
    /// Appends a message to a thread
    pub async fn create(
        executor: impl PgExecutor<'_>,
        thread_user_id: i64,
        sender_id: i64,
        from_support: bool,
        body: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SupportMessage>(
            r#"
            INSERT INTO support_chat (user_id, sender_id, from_support, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, sender_id, from_support, body, read_at, created_at
            "#,
        )
        .bind(thread_user_id)
        .bind(sender_id)
        .bind(from_support)
        .bind(body)
        .fetch_one(executor)
        .await
    }

    /// Messages of one thread, oldest first
    pub async fn list_thread(
        executor: impl PgExecutor<'_>,
        thread_user_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SupportMessage>(
            r#"
            SELECT id, user_id, sender_id, from_support, body, read_at, created_at
            FROM support_chat
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(thread_user_id)
        .fetch_all(executor)
        .await
    }

    /// Marks as read the messages written by the other side
    ///
    /// `reader_is_support` selects which side is reading: staff read user
    /// messages, the thread owner reads staff replies.
    pub async fn mark_read(
        executor: impl PgExecutor<'_>,
        thread_user_id: i64,
        reader_is_support: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE support_chat SET read_at = NOW()
            WHERE user_id = $1 AND from_support <> $2 AND read_at IS NULL
            "#,
        )
        .bind(thread_user_id)
        .bind(reader_is_support)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Number of unread staff replies in a user's thread
    pub async fn unread_count(executor: impl PgExecutor<'_>, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM support_chat WHERE user_id = $1 AND from_support AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Staff inbox: one row per thread, most recently active first
    pub async fn list_threads(executor: impl PgExecutor<'_>) -> Result<Vec<SupportThread>, sqlx::Error> {
        sqlx::query_as::<_, SupportThread>(
            r#"
            SELECT sc.user_id,
                   u.username,
                   MAX(sc.created_at) AS last_message_at,
                   COUNT(*) AS message_count,
                   COUNT(*) FILTER (WHERE NOT sc.from_support AND sc.read_at IS NULL) AS unread
            FROM support_chat sc
            JOIN users u ON u.id = sc.user_id
            GROUP BY sc.user_id, u.username
            ORDER BY last_message_at DESC
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Deletes every message created more than [`SUPPORT_RETENTION_DAYS`]
    /// before `now`
    ///
    /// Returns the number of messages removed.
    pub async fn purge_expired(executor: impl PgExecutor<'_>, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let cutoff = now - Duration::days(SUPPORT_RETENTION_DAYS);
        let result = sqlx::query("DELETE FROM support_chat WHERE created_at < $1")
            .bind(cutoff)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
