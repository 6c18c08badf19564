/// Company task model
///
/// Tasks are assigned to at most one company member. Edit rights follow the
/// note rule: the author or a company owner/admin, with no status gate.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     company_id BIGINT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
///     created_by BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     assigned_to BIGINT REFERENCES users(id) ON DELETE SET NULL,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status TEXT NOT NULL DEFAULT 'todo',
///     due_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub company_id: i64,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub company_id: i64,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
}

/// Partial update; `None` leaves the column unchanged and an empty
/// `description` clears it
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<i64>,
    /// Removes the assignee; takes precedence over `assigned_to`
    pub unassign: bool,
}

const TASK_COLUMNS: &str = "id, company_id, created_by, assigned_to, title, description, status, \
                            due_date, created_at, updated_at";

impl Task {
    pub async fn create(executor: impl PgExecutor<'_>, data: CreateTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (company_id, created_by, assigned_to, title, description, status, due_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(data.company_id)
        .bind(data.created_by)
        .bind(data.assigned_to)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.due_date)
        .fetch_one(executor)
        .await
    }

    /// Lists a company's tasks: open work first, then by due date
    pub async fn list_for_company(
        executor: impl PgExecutor<'_>,
        company_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE company_id = $1
             ORDER BY status = 'done', due_date ASC NULLS LAST, id DESC"
        ))
        .bind(company_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update(
        executor: impl PgExecutor<'_>,
        id: i64,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks
             SET title = COALESCE($2, title),
                 description = NULLIF(COALESCE($3, description), ''),
                 status = COALESCE($4, status),
                 due_date = COALESCE($5, due_date),
                 assigned_to = CASE WHEN $7 THEN NULL ELSE COALESCE($6, assigned_to) END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.due_date)
        .bind(data.assigned_to)
        .bind(data.unassign)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete(executor: impl PgExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
