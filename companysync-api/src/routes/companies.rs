/// Company endpoints
///
/// - `GET    /v1/companies`: Companies the caller belongs to
/// - `POST   /v1/companies`: Create a company; the caller becomes its owner
/// - `GET    /v1/companies/:company_id`: One company (members only)
/// - `PUT    /v1/companies/:company_id`: Rename or redescribe (owner/admin)
/// - `DELETE /v1/companies/:company_id`: Delete (owner only)

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
use companysync_shared::{
    audit::{writer::record_or_warn, AuditAction},
    auth::{
        authorization::{require_manager, require_member},
        identity::Identity,
    },
    models::company::{Company, CreateCompany, MemberCompany, UpdateCompany},
    models::membership::MembershipRole,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
}

/// A company with the caller's role in it
#[derive(Debug, Serialize)]
pub struct CompanyResponse {
    #[serde(flatten)]
    pub company: Company,
    pub role_in_company: MembershipRole,
}

pub async fn list_companies(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<MemberCompany>>> {
    let companies = Company::list_for_user(&state.db, identity.user_id).await?;
    Ok(Json(companies))
}

pub async fn create_company(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateCompanyRequest>,
) -> ApiResult<(StatusCode, Json<CompanyResponse>)> {
    req.validate()?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid("name", "Name is required"));
    }

    let mut tx = state.db.begin().await?;

    let company = Company::create_with_owner(
        &mut tx,
        CreateCompany {
            name,
            description: non_blank(req.description),
        },
        identity.user_id,
    )
    .await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::CreateCompany,
        json!({ "companyId": company.id, "name": company.name }),
    )
    .await;

    tx.commit().await?;

    tracing::info!(company_id = company.id, user_id = identity.user_id, "Company created");

    Ok((
        StatusCode::CREATED,
        Json(CompanyResponse {
            company,
            role_in_company: MembershipRole::Owner,
        }),
    ))
}

pub async fn get_company(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
) -> ApiResult<Json<CompanyResponse>> {
    let role = require_member(&state.db, company_id, identity.user_id).await?;

    let company = Company::find_by_id(&state.db, company_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Company not found".to_string()))?;

    Ok(Json(CompanyResponse {
        company,
        role_in_company: role,
    }))
}

pub async fn update_company(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
    Json(req): Json<UpdateCompanyRequest>,
) -> ApiResult<Json<CompanyResponse>> {
    req.validate()?;

    let mut tx = state.db.begin().await?;

    let role = require_manager(&mut *tx, company_id, identity.user_id).await?;

    let company = Company::update(
        &mut *tx,
        company_id,
        UpdateCompany {
            name: non_blank(req.name),
            description: clearable(req.description),
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Company not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::UpdateCompany,
        json!({ "companyId": company_id }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(CompanyResponse {
        company,
        role_in_company: role,
    }))
}

/// Deletes a company with its memberships, records, notes, and tasks
///
/// Uploaded files are not removed.
pub async fn delete_company(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let role = require_member(&mut *tx, company_id, identity.user_id).await?;
    if !role.can_delete_company() {
        return Err(ApiError::Forbidden("Only the company owner can delete it".to_string()));
    }

    if !Company::delete(&mut *tx, company_id).await? {
        return Err(ApiError::NotFound("Company not found".to_string()));
    }

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::DeleteCompany,
        json!({ "companyId": company_id }),
    )
    .await;

    tx.commit().await?;

    tracing::info!(company_id, user_id = identity.user_id, "Company deleted");

    Ok(StatusCode::NO_CONTENT)
}
