/// Authentication endpoints
///
/// - `POST /v1/auth/register`: Create an account and sign in
/// - `POST /v1/auth/login`: Sign in with email and password
/// - `POST /v1/auth/logout`: Revoke the current session
/// - `GET  /v1/auth/me`: Current identity and company memberships
///
/// A successful sign-in sets the `session` cookie and also returns the
/// token in the body for clients that prefer `Authorization: Bearer`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::request_token,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use companysync_shared::{
    auth::{
        identity::{Identity, SESSION_COOKIE},
        password,
        session::{generate_session_token, hash_session_token},
    },
    models::{
        company::{Company, MemberCompany},
        session::Session,
        setting::{Setting, REGISTRATION_ENABLED},
        user::{CreateUser, GlobalRole, User},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3 to 64 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Response to register and login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// Response to `GET /me`
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: Identity,
    pub companies: Vec<MemberCompany>,
}

/// Usernames: ASCII letters, digits, `_`, `.`, `-`
pub fn is_valid_username(username: &str) -> bool {
    username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Session cookie for a new sign-in
pub fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .secure(secure)
        .build()
}

/// Cookie matching [`session_cookie`] by name and path, for removal
pub fn session_cookie_removal(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").secure(secure).build()
}

/// Opens a session for `user` and builds the response
async fn start_session(state: &AppState, jar: CookieJar, user: User, status: StatusCode) -> ApiResult<Response> {
    let (token, token_hash) = generate_session_token();
    let ttl = Duration::hours(state.config.session.ttl_hours);

    Session::create(&state.db, user.id, &token_hash, Utc::now() + ttl).await?;
    User::update_last_login(&state.db, user.id).await?;

    let jar = jar.add(session_cookie(
        token.clone(),
        ttl.num_seconds(),
        state.config.api.production,
    ));

    Ok((status, jar, Json(SessionResponse { token, user })).into_response())
}

/// Register a new account
///
/// Refused with 403 while the `registration_enabled` setting is false.
///
/// # Errors
///
/// - `403 Forbidden`: Registration disabled
/// - `409 Conflict`: Email or username taken
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let username = req.username.trim().to_string();
    if !is_valid_username(&username) {
        return Err(ApiError::invalid(
            "username",
            "Username may only contain letters, digits, '_', '.' and '-'",
        ));
    }

    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid("password", message))?;

    if !Setting::get_bool(&state.db, REGISTRATION_ENABLED, true).await? {
        return Err(ApiError::Forbidden("Registration is currently disabled".to_string()));
    }

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }
    if User::username_exists(&state.db, &username).await? {
        return Err(ApiError::Conflict("Username already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    // Unique constraints still catch a concurrent duplicate
    let user = User::create(
        &state.db,
        CreateUser {
            username,
            email: req.email,
            password_hash,
            role: GlobalRole::User,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    start_session(&state, jar, user, StatusCode::CREATED).await
}

/// Sign in with email and password
///
/// Unknown email, wrong password, and banned accounts all answer 401 with
/// the same message.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    if !user.active {
        tracing::info!(user_id = user.id, "Login rejected: account banned");
        return Err(invalid());
    }

    tracing::info!(user_id = user.id, "User logged in");

    start_session(&state, jar, user, StatusCode::OK).await
}

/// Revoke the current session and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if let Some(token) = request_token(&headers) {
        Session::revoke(&state.db, &hash_session_token(&token)).await?;
    }

    tracing::info!(user_id = identity.user_id, "User logged out");

    let jar = jar.remove(session_cookie_removal(state.config.api.production));
    Ok((StatusCode::NO_CONTENT, jar).into_response())
}

/// Current identity and the companies it belongs to
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<MeResponse>> {
    let companies = Company::list_for_user(&state.db, identity.user_id).await?;

    Ok(Json(MeResponse { identity, companies }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_charset() {
        assert!(is_valid_username("jane.doe-42_x"));
        assert!(!is_valid_username("jane doe"));
        assert!(!is_valid_username("jane/doe"));
        assert!(!is_valid_username("ädmin"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("cs_abc".to_string(), 3600, false);
        assert_eq!(cookie.name(), "session");
        assert_eq!(cookie.value(), "cs_abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(1)));
        assert!(!cookie.to_string().contains("Secure"));

        let secure = session_cookie("cs_abc".to_string(), 3600, true);
        assert_eq!(secure.secure(), Some(true));
        assert!(secure.to_string().contains("Secure"));
    }

    #[test]
    fn test_logout_clears_session_cookie() {
        let jar = CookieJar::new().add(session_cookie("cs_abc".to_string(), 3600, false));
        let jar = jar.remove(session_cookie_removal(false));
        assert!(jar.get(SESSION_COOKIE).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, "session=cs_abc".parse().unwrap());
        let removal = CookieJar::from_headers(&headers)
            .remove(session_cookie_removal(false))
            .into_response();
        let set_cookie = removal.headers()[axum::http::header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
        assert!(set_cookie.contains("Path=/"));
    }

    #[test]
    fn test_register_validation() {
        let req = RegisterRequest {
            username: "ab".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };
        let err = ApiError::from(req.validate().unwrap_err());
        match err {
            ApiError::ValidationError(details) => {
                let fields: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "password", "username"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
