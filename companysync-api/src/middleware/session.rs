/// Session authentication middleware
///
/// [`session_auth`] resolves the request's session token to an
/// [`Identity`] and stores it in the request extensions; handlers read it
/// with `Extension<Identity>`. The role gates run after it and reject
/// callers without the required global role.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use companysync_shared::auth::identity::{extract_token, resolve_identity, Identity, SESSION_COOKIE};

use crate::{app::AppState, error::ApiError};

/// Session token of a request, from the `session` cookie or a bearer header
///
/// Surrounding double quotes on the cookie value are dropped.
pub fn request_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value_trimmed());
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    extract_token(cookie, authorization).map(str::to_string)
}

/// Requires a valid session on every request it wraps
pub async fn session_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let identity = resolve_identity(&state.db, &token).await?;

    tracing::Span::current().record("user_id", identity.user_id);
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

fn identity(req: &Request) -> Result<&Identity, ApiError> {
    req.extensions()
        .get::<Identity>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
}

/// Admin panel gate (global role `admin`)
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    if !identity(&req)?.is_admin() {
        return Err(ApiError::Forbidden("Administrator access required".to_string()));
    }
    Ok(next.run(req).await)
}

/// Support inbox gate (global role `support` or `admin`)
pub async fn require_support_staff(req: Request, next: Next) -> Result<Response, ApiError> {
    if !identity(&req)?.is_support_staff() {
        return Err(ApiError::Forbidden("Support staff access required".to_string()));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::COOKIE, HeaderValue, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use companysync_shared::models::user::GlobalRole;
    use tower::Service as _;

    fn headers(pairs: &[(axum::http::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_request_token_reads_session_cookie() {
        let map = headers(&[(COOKIE, "theme=dark; session=cs_abc; other=1")]);
        assert_eq!(request_token(&map).as_deref(), Some("cs_abc"));

        let similar = headers(&[(COOKIE, "session_id=cs_abc")]);
        assert_eq!(request_token(&similar), None);
    }

    #[test]
    fn test_request_token_unquotes_cookie_value() {
        let map = headers(&[(COOKIE, "session=\"cs_quoted\"")]);
        assert_eq!(request_token(&map).as_deref(), Some("cs_quoted"));
    }

    #[test]
    fn test_request_token_prefers_cookie_over_bearer() {
        let both = headers(&[(COOKIE, "session=cs_cookie"), (AUTHORIZATION, "Bearer cs_header")]);
        assert_eq!(request_token(&both).as_deref(), Some("cs_cookie"));

        let empty_cookie = headers(&[(COOKIE, "session="), (AUTHORIZATION, "Bearer cs_header")]);
        assert_eq!(request_token(&empty_cookie).as_deref(), Some("cs_header"));

        assert_eq!(request_token(&HeaderMap::new()), None);
    }

    fn gated(role: Option<GlobalRole>) -> Router {
        let mut router = Router::new()
            .route("/admin", get(|| async { "admin" }))
            .route_layer(middleware::from_fn(require_admin));

        if let Some(role) = role {
            router = router.layer(Extension(Identity {
                user_id: 1,
                username: "someone".to_string(),
                role,
            }));
        }
        router
    }

    async fn status(mut app: Router) -> StatusCode {
        app.call(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_require_admin() {
        assert_eq!(status(gated(Some(GlobalRole::Admin))).await, StatusCode::OK);
        assert_eq!(status(gated(Some(GlobalRole::Support))).await, StatusCode::FORBIDDEN);
        assert_eq!(status(gated(Some(GlobalRole::User))).await, StatusCode::FORBIDDEN);
        assert_eq!(status(gated(None)).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_support_staff() {
        let app = |role: GlobalRole| {
            Router::new()
                .route("/inbox", get(|| async { "inbox" }))
                .route_layer(middleware::from_fn(require_support_staff))
                .layer(Extension(Identity {
                    user_id: 1,
                    username: "someone".to_string(),
                    role,
                }))
        };

        for (role, expected) in [
            (GlobalRole::Support, StatusCode::OK),
            (GlobalRole::Admin, StatusCode::OK),
            (GlobalRole::User, StatusCode::FORBIDDEN),
        ] {
            let response = app(role)
                .call(Request::builder().uri("/inbox").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }
    }
}
