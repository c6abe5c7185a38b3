//! Signed, stateless session tokens (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use super::role::Role;
use crate::error::Error;

/// The only algorithm a session token may declare.
const PINNED_ALGORITHM: Algorithm = Algorithm::HS256;

/// SessionClaims
///
/// Payload of a session token. Nothing here is persisted: the token is the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Issuer (iss): must equal the configured issuer.
    pub iss: String,
    /// The authenticated user's id.
    pub uid: i64,
    pub role: Role,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: i64,
}

/// Raised while building the service. Any of these is a fatal misconfiguration.
#[derive(ThisError, Debug, PartialEq)]
pub enum SessionConfigError {
    #[error("session signing secret is not set")]
    MissingSecret,
    #[error("session issuer is not set")]
    MissingIssuer,
    #[error("session lifetime must be positive")]
    InvalidTtl,
}

/// AuthError
///
/// Why a session token was rejected. Only ever logged; the client sees a plain 401.
#[derive(ThisError, Debug, PartialEq)]
pub enum AuthError {
    #[error("token declares an unexpected signing algorithm")]
    AlgorithmMismatch,
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or carries invalid claims")]
    Malformed,
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        tracing::debug!("session rejected: {}", err);
        Error::Unauthenticated
    }
}

/// SessionTokenService
///
/// Issues and validates session tokens using one symmetric secret. Validation does
/// no I/O and touches no mutable state, so it runs on every authenticated request
/// without contention.
pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl SessionTokenService {
    pub fn new(secret: &str, issuer: &str, ttl: Duration) -> Result<Self, SessionConfigError> {
        if secret.is_empty() {
            return Err(SessionConfigError::MissingSecret);
        }
        if issuer.is_empty() {
            return Err(SessionConfigError::MissingIssuer);
        }
        if ttl <= Duration::zero() {
            return Err(SessionConfigError::InvalidTtl);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            ttl,
        })
    }

    /// Issue a token for `user_id` valid from now until now + ttl.
    pub fn issue(&self, user_id: i64, role: Role) -> Result<String, Error> {
        self.issue_at(user_id, role, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, user_id: i64, role: Role, now: DateTime<Utc>) -> Result<String, Error> {
        let claims = SessionClaims {
            iss: self.issuer.clone(),
            uid: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(PINNED_ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            Error::Internal {
                operation: format!("sign session token: {e}"),
            }
        })
    }

    /// Validate a token and return its claims.
    ///
    /// Order matters: the declared algorithm is checked before the signature is
    /// trusted, then the signature, then expiry and issuer, then the typed claims.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        if header.alg != PINNED_ALGORITHM {
            return Err(AuthError::AlgorithmMismatch);
        }

        let mut validation = Validation::new(PINNED_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidAlgorithm => AuthError::AlgorithmMismatch,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            },
        )?;

        // The library tolerates exp == now; a session is only live strictly before exp.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    const SECRET: &str = "test-secret-key-for-sessions";
    const ISSUER: &str = "platform-registry-test";

    fn service() -> SessionTokenService {
        SessionTokenService::new(SECRET, ISSUER, Duration::hours(24)).unwrap()
    }

    fn encode_segment(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn test_round_trip() {
        let svc = service();
        let token = svc.issue(7, Role::Admin).unwrap();

        let claims = svc.validate(&token).unwrap();
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_construction_fails_fast() {
        assert_eq!(
            SessionTokenService::new("", ISSUER, Duration::hours(1)).err(),
            Some(SessionConfigError::MissingSecret)
        );
        assert_eq!(
            SessionTokenService::new(SECRET, "", Duration::hours(1)).err(),
            Some(SessionConfigError::MissingIssuer)
        );
        assert_eq!(
            SessionTokenService::new(SECRET, ISSUER, Duration::zero()).err(),
            Some(SessionConfigError::InvalidTtl)
        );
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let svc = service();
        let token = svc.issue(7, Role::User).unwrap();

        // Flip one character inside the signature segment.
        let mut bytes = token.into_bytes();
        let idx = bytes.len() - 10;
        bytes[idx] = if bytes[idx] == b'a' { b'b' } else { b'a' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(svc.validate(&tampered).is_err());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let svc = service();
        let token = svc.issue(7, Role::User).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged_payload = encode_segment(&serde_json::json!({
            "iss": ISSUER, "uid": 7, "role": "admin",
            "iat": Utc::now().timestamp(), "exp": Utc::now().timestamp() + 3600,
        }));
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(svc.validate(&forged), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_other_hmac_algorithm_is_rejected() {
        let svc = service();
        let now = Utc::now();
        let claims = SessionClaims {
            iss: ISSUER.to_string(),
            uid: 7,
            role: Role::Admin,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(svc.validate(&token), Err(AuthError::AlgorithmMismatch));
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let svc = service();
        let header = encode_segment(&serde_json::json!({ "alg": "none", "typ": "JWT" }));
        let payload = encode_segment(&serde_json::json!({
            "iss": ISSUER, "uid": 7, "role": "admin",
            "iat": Utc::now().timestamp(), "exp": Utc::now().timestamp() + 3600,
        }));
        let token = format!("{header}.{payload}.");

        assert!(svc.validate(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let svc = service();
        let token = svc
            .issue_at(7, Role::User, Utc::now() - Duration::hours(25))
            .unwrap();

        assert_eq!(svc.validate(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_wrong_secret_or_issuer_is_rejected() {
        let token = service().issue(7, Role::User).unwrap();

        let other_secret =
            SessionTokenService::new("another-secret", ISSUER, Duration::hours(1)).unwrap();
        assert_eq!(other_secret.validate(&token), Err(AuthError::InvalidSignature));

        let other_issuer =
            SessionTokenService::new(SECRET, "someone-else", Duration::hours(1)).unwrap();
        assert_eq!(other_issuer.validate(&token), Err(AuthError::Malformed));
    }

    #[test]
    fn test_malformed_claims_are_rejected() {
        let svc = service();
        let key = EncodingKey::from_secret(SECRET.as_bytes());
        let exp = Utc::now().timestamp() + 3600;

        let bad_role = serde_json::json!({
            "iss": ISSUER, "uid": 7, "role": "superuser", "iat": 0, "exp": exp,
        });
        let bad_uid = serde_json::json!({
            "iss": ISSUER, "uid": "seven", "role": "user", "iat": 0, "exp": exp,
        });
        let missing_uid = serde_json::json!({
            "iss": ISSUER, "role": "user", "iat": 0, "exp": exp,
        });

        for claims in [bad_role, bad_uid, missing_uid] {
            let token = encode(&Header::new(Algorithm::HS256), &claims, &key).unwrap();
            assert_eq!(svc.validate(&token), Err(AuthError::Malformed), "{claims}");
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        let svc = service();
        for token in ["", "invalid", "not.a.token", "too.many.parts.in.this"] {
            assert!(svc.validate(token).is_err(), "{token}");
        }
    }
}
