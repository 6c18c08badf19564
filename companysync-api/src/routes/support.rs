/// Support chat endpoints
///
/// Each user has one thread with the support team.
///
/// - `GET  /v1/support/messages`: Own thread; marks staff replies read
/// - `POST /v1/support/messages`: Post to own thread
/// - `GET  /v1/support/unread`: Unread staff replies in own thread
/// - `GET  /v1/support/threads`: Inbox (staff)
/// - `GET  /v1/support/threads/:user_id`: Read a thread; marks user messages read (staff)
/// - `POST /v1/support/threads/:user_id`: Reply (staff)
/// - `POST /v1/support/purge`: Delete expired messages (staff)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use companysync_shared::{
    audit::{writer::record_or_warn, AuditAction},
    auth::identity::Identity,
    models::{
        support_chat::{SupportMessage, SupportThread, SUPPORT_RETENTION_DAYS},
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct MessageRequest {
    #[validate(length(min = 1, max = 5000, message = "Message must be 1 to 5000 characters"))]
    pub body: String,
}

impl MessageRequest {
    /// Validated, trimmed body
    fn into_body(self) -> ApiResult<String> {
        self.validate()?;
        let body = self.body.trim().to_string();
        if body.is_empty() {
            return Err(ApiError::invalid("body", "Message cannot be blank"));
        }
        Ok(body)
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: u64,
    pub retention_days: i64,
}

pub async fn my_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<SupportMessage>>> {
    let mut tx = state.db.begin().await?;

    SupportMessage::mark_read(&mut *tx, identity.user_id, false).await?;
    let messages = SupportMessage::list_thread(&mut *tx, identity.user_id).await?;

    tx.commit().await?;

    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<(StatusCode, Json<SupportMessage>)> {
    let body = req.into_body()?;

    let message = SupportMessage::create(&state.db, identity.user_id, identity.user_id, false, &body).await?;

    tracing::debug!(user_id = identity.user_id, message_id = message.id, "Support message posted");

    Ok((StatusCode::CREATED, Json(message)))
}

/// Counted from the store on every call
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<UnreadResponse>> {
    let unread = SupportMessage::unread_count(&state.db, identity.user_id).await?;
    Ok(Json(UnreadResponse { unread }))
}

pub async fn list_threads(State(state): State<AppState>) -> ApiResult<Json<Vec<SupportThread>>> {
    Ok(Json(SupportMessage::list_threads(&state.db).await?))
}

pub async fn read_thread(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<SupportMessage>>> {
    let mut tx = state.db.begin().await?;

    SupportMessage::mark_read(&mut *tx, user_id, true).await?;
    let messages = SupportMessage::list_thread(&mut *tx, user_id).await?;

    tx.commit().await?;

    Ok(Json(messages))
}

pub async fn reply(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<i64>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<(StatusCode, Json<SupportMessage>)> {
    let body = req.into_body()?;

    if User::find_by_id(&state.db, user_id).await?.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let message = SupportMessage::create(&state.db, user_id, identity.user_id, true, &body).await?;

    tracing::debug!(thread_user_id = user_id, staff_id = identity.user_id, "Support reply posted");

    Ok((StatusCode::CREATED, Json(message)))
}

/// Deletes messages older than the retention window
pub async fn purge(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<PurgeResponse>> {
    let mut tx = state.db.begin().await?;

    let removed = SupportMessage::purge_expired(&mut *tx, Utc::now()).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::PurgeSupportMessages,
        json!({ "removed": removed }),
    )
    .await;

    tx.commit().await?;

    tracing::info!(removed, user_id = identity.user_id, "Support messages purged");

    Ok(Json(PurgeResponse {
        removed,
        retention_days: SUPPORT_RETENTION_DAYS,
    }))
}
