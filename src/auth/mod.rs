use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use std::sync::Arc;

use crate::error::Error;

pub mod one_time;
pub mod password;
pub mod role;
pub mod session;

pub use one_time::OneTimeTokenService;
pub use password::PasswordHasher;
pub use role::{Role, is_admin};
pub use session::{SessionClaims, SessionTokenService};

/// SessionState
///
/// Shared handle to the session token service, pulled from the application state.
pub type SessionState = Arc<SessionTokenService>;

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Everything here comes from
/// the verified session claims; no database lookup is involved.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
    pub claims: SessionClaims,
}

/// AuthUser Extractor Implementation
///
/// 1. Token Extraction: the `Authorization: Bearer <token>` header.
/// 2. Token Validation: `SessionTokenService::validate` (algorithm, signature,
///    expiry, issuer, typed claims).
///
/// Rejection: `Error::Unauthenticated` (401) on any failure. The precise reason is
/// logged at debug level only.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionState: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionState::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(Error::Unauthenticated)?;

        let claims = sessions.validate(token)?;

        Ok(AuthUser {
            id: claims.uid,
            role: claims.role,
            claims,
        })
    }
}

/// AdminUser Extractor
///
/// Authenticates first, then authorizes: a valid session without the admin role is
/// rejected with `Error::Forbidden` (403), a missing or invalid one with 401.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    SessionState: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if !is_admin(&user.claims) {
            tracing::info!(user_id = user.id, "admin route denied");
            return Err(Error::Forbidden);
        }

        Ok(AdminUser(user))
    }
}
