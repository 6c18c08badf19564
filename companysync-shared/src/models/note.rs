/// Company note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub company_id: i64,
    pub created_by: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNote {
    pub company_id: i64,
    pub created_by: i64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl Note {
    pub async fn create(executor: impl PgExecutor<'_>, data: CreateNote) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Note>(
            r#"
            INSERT INTO notes (company_id, created_by, title, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, company_id, created_by, title, content, created_at, updated_at
            "#,
        )
        .bind(data.company_id)
        .bind(data.created_by)
        .bind(data.title)
        .bind(data.content)
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_company(
        executor: impl PgExecutor<'_>,
        company_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Note>(
            r#"
            SELECT id, company_id, created_by, title, content, created_at, updated_at
            FROM notes
            WHERE company_id = $1
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .bind(company_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update(
        executor: impl PgExecutor<'_>,
        id: i64,
        data: UpdateNote,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, company_id, created_by, title, content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.title)
        .bind(data.content)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
