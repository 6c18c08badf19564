/// Uploaded file metadata
///
/// The bytes live in the blob store under `storage_key`; these rows only
/// record where. Parents are referenced without foreign keys, so a file row
/// can outlive the company or finance record it was attached to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// File attached to a company
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyFile {
    pub id: i64,
    pub company_id: i64,
    pub uploaded_by: i64,
    pub filename: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub url: String,
    pub mimetype: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// File attached to a finance record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FinanceFile {
    pub id: i64,
    pub finance_record_id: i64,
    pub uploaded_by: i64,
    pub filename: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub url: String,
    pub mimetype: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Metadata of a stored upload, before it is attached to a parent
#[derive(Debug, Clone)]
pub struct NewFile {
    pub uploaded_by: i64,
    pub filename: String,
    pub storage_key: String,
    pub url: String,
    pub mimetype: String,
    pub size_bytes: i64,
}

impl CompanyFile {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        company_id: i64,
        file: NewFile,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CompanyFile>(
            r#"
            INSERT INTO company_files
                (company_id, uploaded_by, filename, storage_key, url, mimetype, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, company_id, uploaded_by, filename, storage_key, url, mimetype,
                      size_bytes, created_at
            "#,
        )
        .bind(company_id)
        .bind(file.uploaded_by)
        .bind(file.filename)
        .bind(file.storage_key)
        .bind(file.url)
        .bind(file.mimetype)
        .bind(file.size_bytes)
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_company(
        executor: impl PgExecutor<'_>,
        company_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CompanyFile>(
            r#"
            SELECT id, company_id, uploaded_by, filename, storage_key, url, mimetype,
                   size_bytes, created_at
            FROM company_files
            WHERE company_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(company_id)
        .fetch_all(executor)
        .await
    }

    /// Deletes the row and returns it so the caller can remove the blob
    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CompanyFile>(
            r#"
            DELETE FROM company_files WHERE id = $1
            RETURNING id, company_id, uploaded_by, filename, storage_key, url, mimetype,
                      size_bytes, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}

impl FinanceFile {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        finance_record_id: i64,
        file: NewFile,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, FinanceFile>(
            r#"
            INSERT INTO finance_files
                (finance_record_id, uploaded_by, filename, storage_key, url, mimetype, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, finance_record_id, uploaded_by, filename, storage_key, url, mimetype,
                      size_bytes, created_at
            "#,
        )
        .bind(finance_record_id)
        .bind(file.uploaded_by)
        .bind(file.filename)
        .bind(file.storage_key)
        .bind(file.url)
        .bind(file.mimetype)
        .bind(file.size_bytes)
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_record(
        executor: impl PgExecutor<'_>,
        finance_record_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FinanceFile>(
            r#"
            SELECT id, finance_record_id, uploaded_by, filename, storage_key, url, mimetype,
                   size_bytes, created_at
            FROM finance_files
            WHERE finance_record_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(finance_record_id)
        .fetch_all(executor)
        .await
    }

    /// Deletes the row and returns it so the caller can remove the blob
    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FinanceFile>(
            r#"
            DELETE FROM finance_files WHERE id = $1
            RETURNING id, finance_record_id, uploaded_by, filename, storage_key, url, mimetype,
                      size_bytes, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}
