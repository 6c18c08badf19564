/// Finance record endpoints
///
/// - `GET    /v1/companies/:company_id/finance`: List (members)
/// - `POST   /v1/companies/:company_id/finance`: Create (members); always `pending`
/// - `PUT    /v1/finance/:record_id`: Edit (mutation policy, status gated)
/// - `DELETE /v1/finance/:record_id`: Delete (mutation policy, status gated)
/// - `PUT    /v1/finance/:record_id/status`: Approve or reject (owner/admin)
///
/// Once a record leaves `pending`, only the company owner or an admin may
/// edit or delete it; the author loses that right.

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
        authorization::{authorize_mutation, require_member, AuthzError},
        identity::Identity,
        policy::{MutationAction, ResourceKind},
    },
    models::finance_record::{
        CreateFinanceRecord, FinanceKind, FinanceRecord, FinanceStatus, UpdateFinanceRecord,
    },
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

/// Largest amount NUMERIC(14, 2) holds
const MAX_AMOUNT_UNITS: i64 = 999_999_999_999;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecordRequest {
    pub kind: FinanceKind,

    pub amount: Decimal,

    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub category: Option<String>,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,

    /// Defaults to today
    pub occurred_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRecordRequest {
    pub kind: Option<FinanceKind>,

    pub amount: Option<Decimal>,

    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub category: Option<String>,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,

    pub occurred_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: FinanceStatus,
}

/// Amounts are positive with at most two decimal places
pub fn validate_amount(amount: Decimal) -> ApiResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::invalid("amount", "Amount must be greater than zero"));
    }
    if amount.scale() > 2 && amount.normalize().scale() > 2 {
        return Err(ApiError::invalid("amount", "Amount has at most two decimal places"));
    }
    if amount > Decimal::new(MAX_AMOUNT_UNITS, 0) {
        return Err(ApiError::invalid("amount", "Amount is too large"));
    }
    Ok(amount)
}

fn status_forbidden() -> ApiError {
    ApiError::Forbidden("Only a company owner or admin can change a record's status".to_string())
}

pub async fn list_records(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
) -> ApiResult<Json<Vec<FinanceRecord>>> {
    require_member(&state.db, company_id, identity.user_id).await?;

    let records = FinanceRecord::list_for_company(&state.db, company_id).await?;
    Ok(Json(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
    Json(req): Json<CreateRecordRequest>,
) -> ApiResult<(StatusCode, Json<FinanceRecord>)> {
    req.validate()?;
    let amount = validate_amount(req.amount)?;

    let mut tx = state.db.begin().await?;

    require_member(&mut *tx, company_id, identity.user_id).await?;

    let record = FinanceRecord::create(
        &mut *tx,
        CreateFinanceRecord {
            company_id,
            created_by: identity.user_id,
            kind: req.kind,
            amount,
            category: non_blank(req.category),
            description: non_blank(req.description),
            occurred_on: req.occurred_on,
        },
    )
    .await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::CreateFinanceRecord,
        json!({
            "companyId": company_id,
            "recordId": record.id,
            "kind": record.kind,
            "amount": record.amount.to_string(),
        }),
    )
    .await;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(record_id): Path<i64>,
    Json(req): Json<UpdateRecordRequest>,
) -> ApiResult<Json<FinanceRecord>> {
    req.validate()?;
    let amount = req.amount.map(validate_amount).transpose()?;

    let mut tx = state.db.begin().await?;

    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::FinanceRecord,
        record_id,
        identity.user_id,
        MutationAction::Update,
    )
    .await?;

    let record = FinanceRecord::update(
        &mut *tx,
        record_id,
        UpdateFinanceRecord {
            kind: req.kind,
            amount,
            category: clearable(req.category),
            description: clearable(req.description),
            occurred_on: req.occurred_on,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Finance record not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::UpdateFinanceRecord,
        json!({ "companyId": guard.state.company_id, "recordId": record_id }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(record_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::FinanceRecord,
        record_id,
        identity.user_id,
        MutationAction::Delete,
    )
    .await?;

    FinanceRecord::delete(&mut *tx, record_id).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::DeleteFinanceRecord,
        json!({ "companyId": guard.state.company_id, "recordId": record_id }),
    )
    .await;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Approve or reject a record (or send it back to `pending`)
///
/// Requires the owner or admin role in the record's company. A record that
/// does not exist answers 403, same as one the caller cannot see.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(record_id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<FinanceRecord>> {
    let mut tx = state.db.begin().await?;

    // Managers always pass the mutation policy; members are filtered below
    let guard = authorize_mutation(
        &mut *tx,
        ResourceKind::FinanceRecord,
        record_id,
        identity.user_id,
        MutationAction::Update,
    )
    .await
    .map_err(|e| match e {
        AuthzError::Forbidden(_) => status_forbidden(),
        other => ApiError::from(other),
    })?;

    if !guard.role.can_set_finance_status() {
        return Err(status_forbidden());
    }

    let previous = guard.state.status;

    let record = FinanceRecord::set_status(&mut *tx, record_id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Finance record not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::SetFinanceStatus,
        json!({
            "companyId": guard.state.company_id,
            "recordId": record_id,
            "from": previous.map(|s| s.as_str()),
            "to": req.status.as_str(),
        }),
    )
    .await;

    tx.commit().await?;

    tracing::info!(record_id, status = req.status.as_str(), user_id = identity.user_id, "Finance status changed");

    Ok(Json(record))
}
