/// Finance record model
///
/// Income and expense entries of a company. New records always start as
/// `pending`; only a company owner or admin moves them to `approved` or
/// `rejected`. While pending, the author may still edit or delete the
/// record (see `auth::policy`).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE finance_records (
///     id BIGSERIAL PRIMARY KEY,
///     company_id BIGINT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
///     created_by BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     kind TEXT NOT NULL,
///     amount NUMERIC(14, 2) NOT NULL CHECK (amount > 0),
///     category VARCHAR(100),
///     description TEXT,
///     occurred_on DATE NOT NULL DEFAULT CURRENT_DATE,
///     status TEXT NOT NULL DEFAULT 'pending',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// Whether money came in or went out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FinanceKind {
    Income,
    Expense,
}

/// Review status of a finance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FinanceStatus {
    /// Awaiting review; the author may still edit
    Pending,

    Approved,

    Rejected,
}

impl FinanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinanceStatus::Pending => "pending",
            FinanceStatus::Approved => "approved",
            FinanceStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FinanceRecord {
    pub id: i64,
    pub company_id: i64,
    pub created_by: i64,
    pub kind: FinanceKind,
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
    pub status: FinanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateFinanceRecord {
    pub company_id: i64,
    pub created_by: i64,
    pub kind: FinanceKind,
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Defaults to today when absent
    pub occurred_on: Option<NaiveDate>,
}

/// Partial update of the editable fields; status has its own operation
///
/// `None` leaves a column unchanged. An empty `category` or `description`
/// clears it to NULL.
#[derive(Debug, Clone, Default)]
pub struct UpdateFinanceRecord {
    pub kind: Option<FinanceKind>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

const RECORD_COLUMNS: &str = "id, company_id, created_by, kind, amount, category, description, \
                              occurred_on, status, created_at, updated_at";

impl FinanceRecord {
    /// Inserts a new record with status `pending`
    pub async fn create(
        executor: impl PgExecutor<'_>,
        data: CreateFinanceRecord,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, FinanceRecord>(&format!(
            "INSERT INTO finance_records
                 (company_id, created_by, kind, amount, category, description, occurred_on, status)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, CURRENT_DATE), 'pending')
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(data.company_id)
        .bind(data.created_by)
        .bind(data.kind)
        .bind(data.amount)
        .bind(data.category)
        .bind(data.description)
        .bind(data.occurred_on)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FinanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM finance_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists a company's records, most recent first
    pub async fn list_for_company(
        executor: impl PgExecutor<'_>,
        company_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FinanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM finance_records
             WHERE company_id = $1
             ORDER BY occurred_on DESC, id DESC"
        ))
        .bind(company_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update(
        executor: impl PgExecutor<'_>,
        id: i64,
        data: UpdateFinanceRecord,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FinanceRecord>(&format!(
            "UPDATE finance_records
             SET kind = COALESCE($2, kind),
                 amount = COALESCE($3, amount),
                 category = NULLIF(COALESCE($4, category), ''),
                 description = NULLIF(COALESCE($5, description), ''),
                 occurred_on = COALESCE($6, occurred_on),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(data.kind)
        .bind(data.amount)
        .bind(data.category)
        .bind(data.description)
        .bind(data.occurred_on)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_status(
        executor: impl PgExecutor<'_>,
        id: i64,
        status: FinanceStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FinanceRecord>(&format!(
            "UPDATE finance_records SET status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM finance_records WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
