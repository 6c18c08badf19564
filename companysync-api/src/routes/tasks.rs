/// Task endpoints
///
/// - `GET    /v1/companies/:company_id/tasks`: List (members)
/// - `POST   /v1/companies/:company_id/tasks`: Create (members)
/// - `PUT    /v1/tasks/:task_id`: Edit (author, owner, or admin)
/// - `DELETE /v1/tasks/:task_id`: Delete (author, owner, or admin)
///
/// An assignee must be a member of the task's company. On update,
/// `"assigned_to": null` leaves the assignee alone; `"unassign": true`
/// clears it.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{clearable, non_blank},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use companysync_shared::{
    audit::{writer::record_or_warn, AuditAction},
    auth::{
        authorization::{authorize_mutation, require_member},
        identity::Identity,
        policy::{MutationAction, ResourceKind},
    },
    models::{
        membership::Membership,
        task::{CreateTask, Task, TaskStatus, UpdateTask},
    },
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgConnection;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    #[validate(length(max = 10000, message = "Description is too long"))]
    pub description: Option<String>,

    /// Defaults to `todo`
    pub status: Option<TaskStatus>,

    pub due_date: Option<NaiveDate>,

    pub assigned_to: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 10000, message = "Description is too long"))]
    pub description: Option<String>,

    pub status: Option<TaskStatus>,

    pub due_date: Option<NaiveDate>,

    pub assigned_to: Option<i64>,

    #[serde(default)]
    pub unassign: bool,
}

async fn check_assignee(conn: &mut PgConnection, company_id: i64, assignee: Option<i64>) -> ApiResult<()> {
    if let Some(user_id) = assignee {
        if Membership::get_role(&mut *conn, company_id, user_id).await?.is_none() {
            return Err(ApiError::invalid(
                "assigned_to",
                "Assignee must be a member of the company",
            ));
        }
    }
    Ok(())
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
) -> ApiResult<Json<Vec<Task>>> {
    require_member(&state.db, company_id, identity.user_id).await?;
    Ok(Json(Task::list_for_company(&state.db, company_id).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::invalid("title", "Title is required"));
    }

    let mut tx = state.db.begin().await?;

    require_member(&mut *tx, company_id, identity.user_id).await?;
    check_assignee(&mut tx, company_id, req.assigned_to).await?;

    let task = Task::create(
        &mut *tx,
        CreateTask {
            company_id,
            created_by: identity.user_id,
            assigned_to: req.assigned_to,
            title,
            description: non_blank(req.description),
            status: req.status.unwrap_or(TaskStatus::Todo),
            due_date: req.due_date,
        },
    )
    .await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::CreateTask,
        json!({
            "companyId": company_id,
            "taskId": task.id,
            "assignedTo": task.assigned_to,
        }),
    )
    .await;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;

    let title = match req.title.map(|t| t.trim().to_string()) {
        Some(t) if t.is_empty() => return Err(ApiError::invalid("title", "Title cannot be blank")),
        other => other,
    };

    let mut tx = state.db.begin().await?;

    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::Task,
        task_id,
        identity.user_id,
        MutationAction::Update,
    )
    .await?;

    if !req.unassign {
        check_assignee(&mut tx, guard.state.company_id, req.assigned_to).await?;
    }

    let task = Task::update(
        &mut *tx,
        task_id,
        UpdateTask {
            title,
            description: clearable(req.description),
            status: req.status,
            due_date: req.due_date,
            assigned_to: req.assigned_to,
            unassign: req.unassign,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::UpdateTask,
        json!({
            "companyId": guard.state.company_id,
            "taskId": task_id,
            "status": task.status.as_str(),
        }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::Task,
        task_id,
        identity.user_id,
        MutationAction::Delete,
    )
    .await?;

    Task::delete(&mut *tx, task_id).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::DeleteTask,
        json!({ "companyId": guard.state.company_id, "taskId": task_id }),
    )
    .await;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
