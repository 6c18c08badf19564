/// Note endpoints
///
/// - `GET    /v1/companies/:company_id/notes`: List (members)
/// - `POST   /v1/companies/:company_id/notes`: Create (members)
/// - `PUT    /v1/notes/:note_id`: Edit (author, owner, or admin)
/// - `DELETE /v1/notes/:note_id`: Delete (author, owner, or admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use companysync_shared::{
    audit::{writer::record_or_warn, AuditAction},
    auth::{
        authorization::{authorize_mutation, require_member},
        identity::Identity,
        policy::{MutationAction, ResourceKind},
    },
    models::note::{CreateNote, Note, UpdateNote},
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 100000, message = "Content is too long"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateNoteRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 100000, message = "Content is too long"))]
    pub content: Option<String>,
}

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
) -> ApiResult<Json<Vec<Note>>> {
    require_member(&state.db, company_id, identity.user_id).await?;
    Ok(Json(Note::list_for_company(&state.db, company_id).await?))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    req.validate()?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::invalid("title", "Title is required"));
    }

    let mut tx = state.db.begin().await?;

    require_member(&mut *tx, company_id, identity.user_id).await?;

    let note = Note::create(
        &mut *tx,
        CreateNote {
            company_id,
            created_by: identity.user_id,
            title,
            content: req.content,
        },
    )
    .await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::CreateNote,
        json!({ "companyId": company_id, "noteId": note.id }),
    )
    .await;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(note_id): Path<i64>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<Json<Note>> {
    req.validate()?;

    let title = match req.title.map(|t| t.trim().to_string()) {
        Some(t) if t.is_empty() => return Err(ApiError::invalid("title", "Title cannot be blank")),
        other => other,
    };

    let mut tx = state.db.begin().await?;

    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::Note,
        note_id,
        identity.user_id,
        MutationAction::Update,
    )
    .await?;

    let note = Note::update(
        &mut *tx,
        note_id,
        UpdateNote {
            title,
            content: req.content,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::UpdateNote,
        json!({ "companyId": guard.state.company_id, "noteId": note_id }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(note_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::Note,
        note_id,
        identity.user_id,
        MutationAction::Delete,
    )
    .await?;

    Note::delete(&mut *tx, note_id).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::DeleteNote,
        json!({ "companyId": guard.state.company_id, "noteId": note_id }),
    )
    .await;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
