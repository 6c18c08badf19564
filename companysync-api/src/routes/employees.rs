/// Employee (membership) endpoints
///
/// - `GET    /v1/companies/:company_id/employees`: List (members)
/// - `POST   /v1/companies/:company_id/employees`: Add by email (owner/admin)
/// - `PUT    /v1/companies/:company_id/employees/:user_id`: Role, salary, note (owner/admin)
/// - `DELETE /v1/companies/:company_id/employees/:user_id`: Remove (owner/admin)
///
/// Adding an email with no account creates one with an unusable password;
/// the person claims it through a password reset outside this service.
/// The owner's membership can be neither changed nor removed, and only the
/// owner grants or revokes the admin role.

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
        password::unusable_password_hash,
        session::random_alphanumeric,
    },
    models::{
        membership::{CreateMembership, Employee, Membership, MembershipRole, UpdateMembership},
        user::{CreateUser, GlobalRole, User},
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgConnection;
use validator::Validate;

const MAX_DERIVED_USERNAME: usize = 48;

#[derive(Debug, Deserialize, Validate)]
pub struct AddEmployeeRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Defaults to `member`
    pub role: Option<MembershipRole>,

    pub salary: Option<Decimal>,

    #[validate(length(max = 2000, message = "Note is too long"))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmployeeRequest {
    pub role: Option<MembershipRole>,

    pub salary: Option<Decimal>,

    #[validate(length(max = 2000, message = "Note is too long"))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddEmployeeResponse {
    pub membership: Membership,
    pub user_created: bool,
}

/// Username for an auto-created account: the email's local part, reduced
/// to the username charset
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut name: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .take(MAX_DERIVED_USERNAME)
        .collect::<String>()
        .to_ascii_lowercase();

    if name.len() < 3 {
        name = format!("user{}", name);
    }
    name
}

fn check_salary(salary: Option<Decimal>) -> ApiResult<()> {
    match salary {
        Some(s) if s.is_sign_negative() => Err(ApiError::invalid("salary", "Salary cannot be negative")),
        _ => Ok(()),
    }
}

/// Finds the account for `email`, creating one when none exists
///
/// Returns the user and whether it was created.
async fn find_or_create_user(conn: &mut PgConnection, email: &str) -> ApiResult<(User, bool)> {
    if let Some(user) = User::find_by_email(&mut *conn, email).await? {
        return Ok((user, false));
    }

    let mut username = username_from_email(email);
    if User::username_exists(&mut *conn, &username).await? {
        username = format!("{}_{}", username, random_alphanumeric(6).to_ascii_lowercase());
    }

    let user = User::create(
        &mut *conn,
        CreateUser {
            username,
            email: email.to_string(),
            password_hash: unusable_password_hash()?,
            role: GlobalRole::User,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "Account created for new employee");

    Ok((user, true))
}

pub async fn list_employees(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
) -> ApiResult<Json<Vec<Employee>>> {
    require_member(&state.db, company_id, identity.user_id).await?;

    let employees = Membership::list_employees(&state.db, company_id).await?;
    Ok(Json(employees))
}

pub async fn add_employee(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(company_id): Path<i64>,
    Json(req): Json<AddEmployeeRequest>,
) -> ApiResult<(StatusCode, Json<AddEmployeeResponse>)> {
    req.validate()?;
    check_salary(req.salary)?;

    let role = req.role.unwrap_or(MembershipRole::Member);
    if role == MembershipRole::Owner {
        return Err(ApiError::invalid("role", "A company has exactly one owner"));
    }

    let mut tx = state.db.begin().await?;

    let actor_role = require_manager(&mut *tx, company_id, identity.user_id).await?;
    if role == MembershipRole::Admin && !actor_role.can_promote_admin() {
        return Err(ApiError::Forbidden("Only the owner can add admins".to_string()));
    }

    let email = req.email.trim().to_lowercase();
    let (user, user_created) = find_or_create_user(&mut tx, &email).await?;

    if Membership::find(&mut *tx, company_id, user.id).await?.is_some() {
        return Err(ApiError::Conflict(
            "User is already a member of this company".to_string(),
        ));
    }

    let membership = Membership::create(
        &mut *tx,
        CreateMembership {
            company_id,
            user_id: user.id,
            role,
            salary: req.salary,
            note: non_blank(req.note),
        },
    )
    .await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::AddEmployee,
        json!({
            "companyId": company_id,
            "userId": user.id,
            "role": role.as_str(),
            "userCreated": user_created,
        }),
    )
    .await;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(AddEmployeeResponse {
            membership,
            user_created,
        }),
    ))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((company_id, user_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateEmployeeRequest>,
) -> ApiResult<Json<Membership>> {
    req.validate()?;
    check_salary(req.salary)?;

    if req.role == Some(MembershipRole::Owner) {
        return Err(ApiError::invalid("role", "Ownership cannot be granted"));
    }

    let mut tx = state.db.begin().await?;

    let actor_role = require_manager(&mut *tx, company_id, identity.user_id).await?;

    let target = Membership::find_for_update(&mut *tx, company_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Employee not found".to_string()))?;

    if let Some(new_role) = req.role {
        if target.role == MembershipRole::Owner && new_role != MembershipRole::Owner {
            return Err(ApiError::Forbidden("The owner's role cannot be changed".to_string()));
        }
        let touches_admin = new_role == MembershipRole::Admin || target.role == MembershipRole::Admin;
        if touches_admin && new_role != target.role && !actor_role.can_promote_admin() {
            return Err(ApiError::Forbidden("Only the owner can grant or revoke admin".to_string()));
        }
    }

    let membership = Membership::update(
        &mut *tx,
        company_id,
        user_id,
        UpdateMembership {
            role: req.role,
            salary: req.salary,
            note: clearable(req.note),
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Employee not found".to_string()))?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::UpdateEmployee,
        json!({
            "companyId": company_id,
            "userId": user_id,
            "role": membership.role.as_str(),
        }),
    )
    .await;

    tx.commit().await?;

    Ok(Json(membership))
}

pub async fn remove_employee(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((company_id, user_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let actor_role = require_manager(&mut *tx, company_id, identity.user_id).await?;

    let target = Membership::find_for_update(&mut *tx, company_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Employee not found".to_string()))?;

    match target.role {
        MembershipRole::Owner => {
            return Err(ApiError::Forbidden("The owner cannot be removed".to_string()));
        }
        MembershipRole::Admin if !actor_role.can_promote_admin() => {
            return Err(ApiError::Forbidden("Only the owner can remove admins".to_string()));
        }
        _ => {}
    }

    Membership::delete(&mut *tx, company_id, user_id).await?;

    record_or_warn(
        &mut tx,
        Some(identity.user_id),
        AuditAction::RemoveEmployee,
        json!({ "companyId": company_id, "userId": user_id }),
    )
    .await;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
