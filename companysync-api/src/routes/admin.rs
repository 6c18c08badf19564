/// Admin panel endpoints (global role `admin`)
///
/// - `GET    /v1/admin/users`: Paginated users, optional `search`
/// - `POST   /v1/admin/users/:user_id/ban`: Deactivate and revoke sessions
/// - `POST   /v1/admin/users/:user_id/unban`
/// - `PUT    /v1/admin/users/:user_id/role`: Change global role
/// - `DELETE /v1/admin/users/:user_id`: Delete (never oneself)
/// - `GET    /v1/admin/companies`: Paginated companies
/// - `GET    /v1/admin/logs`: Filtered, paginated audit log
/// - `GET    /v1/admin/logs/export`: Same filters as CSV, unpaginated
/// - `GET    /v1/admin/settings`
/// - `PUT    /v1/admin/settings/:key`: Upsert a JSON value

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::PageQuery,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use companysync_shared::{
    audit::{csv, query, writer::record_or_warn, AuditAction, AuditFilter, LogEntry},
    auth::{
        authorization::enforce,
        identity::Identity,
        policy::can_delete_user,
    },
    models::{
        company::{Company, CompanySummary},
        page::{Page, Pagination},
        session::Session,
        setting::Setting,
        user::{GlobalRole, User},
    },
};
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_SETTING_KEY_LEN: usize = 64;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Audit log query string
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub username: Option<String>,
    pub action: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl LogQuery {
    pub fn filter(&self) -> AuditFilter {
        AuditFilter {
            username: self.username.clone(),
            action: self.action.clone(),
            from: self.from,
            to: self.to,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: GlobalRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: Value,
}

/// Setting keys are short snake_case identifiers
pub fn is_valid_setting_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_SETTING_KEY_LEN
        && key.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// `companysync-logs-YYYYMMDD.csv`
pub fn export_filename(date: NaiveDate) -> String {
    format!("companysync-logs-{}.csv", date.format("%Y%m%d"))
}

fn not_self(identity: &Identity, user_id: i64, message: &str) -> ApiResult<()> {
    if identity.user_id == user_id {
        return Err(ApiError::Forbidden(message.to_string()));
    }
    Ok(())
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UserQuery>,
) -> ApiResult<Json<Page<User>>> {
    let search = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let pagination = Pagination::new(params.page, params.per_page);

    Ok(Json(User::list(&state.db, search, pagination).await?))
}

pub async fn ban_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<User>> {
    not_self(&identity, user_id, "You cannot ban yourself")?;

    let mut tx = state.db.begin().await?;

    let user = User::set_active(&mut *tx, user_id, false)
        .await?
        .ok_or_else(user_not_found)?;
    let revoked = Session::revoke_all_for_user(&mut *tx, user_id).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::BanUser,
        json!({ "userId": user_id, "sessionsRevoked": revoked }),
    )
    .await;

    tx.commit().await?;

    tracing::info!(user_id, admin_id = identity.user_id, revoked, "User banned");

    Ok(Json(user))
}

pub async fn unban_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<User>> {
    let mut tx = state.db.begin().await?;

    let user = User::set_active(&mut *tx, user_id, true)
        .await?
        .ok_or_else(user_not_found)?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::UnbanUser,
        json!({ "userId": user_id }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(user))
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<i64>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<User>> {
    not_self(&identity, user_id, "You cannot change your own role")?;

    let mut tx = state.db.begin().await?;

    let previous = User::find_by_id(&mut *tx, user_id)
        .await?
        .ok_or_else(user_not_found)?
        .role;

    let user = User::set_role(&mut *tx, user_id, req.role)
        .await?
        .ok_or_else(user_not_found)?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::ChangeUserRole,
        json!({
            "userId": user_id,
            "from": previous.as_str(),
            "to": req.role.as_str(),
        }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    enforce(can_delete_user(identity.user_id, user_id))?;

    let mut tx = state.db.begin().await?;

    let user = User::find_by_id(&mut *tx, user_id)
        .await?
        .ok_or_else(user_not_found)?;

    User::delete(&mut *tx, user_id).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::DeleteUser,
        json!({ "userId": user_id, "username": user.username }),
    )
    .await;

    tx.commit().await?;

    tracing::info!(user_id, admin_id = identity.user_id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_companies(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> ApiResult<Json<Page<CompanySummary>>> {
    Ok(Json(Company::list_all(&state.db, params.into()).await?))
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogQuery>,
) -> ApiResult<Json<Page<LogEntry>>> {
    let mut snapshot = query::read_snapshot(&state.db).await?;
    let page = query::list(&mut snapshot, &params.filter(), params.pagination()).await?;
    snapshot.commit().await?;
    Ok(Json(page))
}

pub async fn export_logs(
    State(state): State<AppState>,
    Query(params): Query<LogQuery>,
) -> ApiResult<Response> {
    let mut conn = state.db.acquire().await?;
    let entries = query::export(&mut conn, &params.filter()).await?;

    tracing::debug!(count = entries.len(), "Audit log exported");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Utc::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv::render(&entries),
    )
        .into_response())
}

pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Json<Vec<Setting>>> {
    Ok(Json(Setting::list(&state.db).await?))
}

pub async fn update_setting(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> ApiResult<Json<Setting>> {
    if !is_valid_setting_key(&key) {
        return Err(ApiError::invalid("key", "Setting keys are lowercase letters, digits, and underscores"));
    }

    let mut tx = state.db.begin().await?;

    let setting = Setting::upsert(&mut *tx, &key, req.value, identity.user_id).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::UpdateSetting,
        json!({ "key": key, "value": &setting.value }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(setting))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_setting_key() {
        assert!(is_valid_setting_key("registration_enabled"));
        assert!(is_valid_setting_key("max_upload_mb2"));
        assert!(!is_valid_setting_key(""));
        assert!(!is_valid_setting_key("Registration"));
        assert!(!is_valid_setting_key("a-b"));
        assert!(!is_valid_setting_key(&"k".repeat(65)));
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename(date), "companysync-logs-20240309.csv");
    }

    #[test]
    fn test_log_query_splits_filter_and_page() {
        let query = LogQuery {
            username: Some("jane".to_string()),
            action: Some("finance".to_string()),
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: None,
            page: Some(2),
            per_page: Some(500),
        };

        let filter = query.filter();
        assert_eq!(filter.username.as_deref(), Some("jane"));
        assert_eq!(filter.action.as_deref(), Some("finance"));
        assert_eq!(filter.from, NaiveDate::from_ymd_opt(2024, 1, 1));

        let pagination = query.pagination();
        assert_eq!(pagination.page(), 2);
        assert_eq!(pagination.per_page(), 100);
    }
}
