/// Request identity resolution
///
/// A request authenticates with a session token, carried either in the
/// `session` cookie or an `Authorization: Bearer` header. The token resolves
/// to a live session, then to an active user.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

use super::authorization::AuthzError;
use super::session::{hash_session_token, is_well_formed};
use crate::models::session::Session;
use crate::models::user::{GlobalRole, User};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Authenticated caller, attached to request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: GlobalRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == GlobalRole::Admin
    }

    pub fn is_support_staff(&self) -> bool {
        self.role.is_support_staff()
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Picks the session token from the `session` cookie value or the
/// `Authorization` header
///
/// The cookie wins over the bearer header when both are present. Cookie
/// parsing happens at the HTTP layer; this only sees the cookie's value.
pub fn extract_token<'a>(session_cookie: Option<&'a str>, authorization: Option<&'a str>) -> Option<&'a str> {
    session_cookie
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or_else(|| {
            authorization
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
        })
}

/// Resolves a session token to the identity behind it
///
/// # Errors
///
/// `Unauthenticated` if the token is malformed, unknown, revoked, expired,
/// or belongs to a banned or deleted user. `Store` on database failure.
pub async fn resolve_identity(pool: &PgPool, token: &str) -> Result<Identity, AuthzError> {
    if !is_well_formed(token) {
        return Err(AuthzError::Unauthenticated);
    }

    let session = Session::find_active(pool, &hash_session_token(token))
        .await?
        .ok_or(AuthzError::Unauthenticated)?;

    let user = User::find_by_id(pool, session.user_id)
        .await?
        .ok_or(AuthzError::Unauthenticated)?;

    if !user.active {
        debug!(user_id = user.id, "Rejected session of inactive user");
        return Err(AuthzError::Unauthenticated);
    }

    Ok(Identity::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_from_cookie() {
        assert_eq!(extract_token(Some("cs_abc"), None), Some("cs_abc"));
    }

    #[test]
    fn test_extract_token_from_bearer() {
        assert_eq!(extract_token(None, Some("Bearer cs_xyz")), Some("cs_xyz"));
        assert_eq!(extract_token(None, Some("Basic dXNlcg==")), None);
        assert_eq!(extract_token(None, Some("Bearer ")), None);
    }

    #[test]
    fn test_cookie_takes_precedence() {
        assert_eq!(
            extract_token(Some("cs_cookie"), Some("Bearer cs_header")),
            Some("cs_cookie")
        );
    }

    #[test]
    fn test_empty_cookie_falls_back_to_bearer() {
        assert_eq!(extract_token(Some(""), None), None);
        assert_eq!(extract_token(Some("  "), Some("Bearer cs_h")), Some("cs_h"));
    }

    #[test]
    fn test_identity_roles() {
        let admin = Identity {
            user_id: 1,
            username: "root".to_string(),
            role: GlobalRole::Admin,
        };
        assert!(admin.is_admin());
        assert!(admin.is_support_staff());

        let support = Identity {
            role: GlobalRole::Support,
            ..admin.clone()
        };
        assert!(!support.is_admin());
        assert!(support.is_support_staff());
    }
}
