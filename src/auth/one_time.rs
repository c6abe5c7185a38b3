//! Single-use registration and password-reset tokens.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::{
    error::Error,
    models::{OneTimeToken, TokenKind},
    repository::TokenStore,
};

/// Bytes of entropy in a raw token before encoding.
const TOKEN_BYTES: usize = 32;

/// How long an issued token stays redeemable.
pub const DEFAULT_VALIDITY_HOURS: i64 = 24;

/// digest
///
/// The value persisted in place of a raw token: lowercase hex SHA-256.
pub fn digest(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn generate_raw() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// OneTimeTokenService
///
/// Issues, validates and consumes one-time tokens against any `TokenStore`.
/// The raw token is returned exactly once from `issue` and never stored; the
/// store only ever sees its digest.
///
/// Validation and consumption are separate calls so that callers can put them and
/// the credential write they guard into one transaction.
#[derive(Debug, Clone)]
pub struct OneTimeTokenService {
    validity: Duration,
}

impl Default for OneTimeTokenService {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_VALIDITY_HOURS))
    }
}

impl OneTimeTokenService {
    pub fn new(validity: Duration) -> Self {
        Self { validity }
    }

    /// issue
    ///
    /// Create a token for `kind`. Registration tokens carry no subject; password
    /// reset tokens must name the account they act on.
    pub async fn issue<S>(
        &self,
        store: &mut S,
        kind: TokenKind,
        subject: Option<i64>,
        issued_by: i64,
    ) -> Result<String, Error>
    where
        S: TokenStore + ?Sized,
    {
        match (kind, subject) {
            (TokenKind::Registration, Some(_)) => {
                return Err(Error::BadRequest {
                    message: "registration tokens cannot target an existing user".to_string(),
                });
            }
            (TokenKind::PasswordReset, None) => {
                return Err(Error::BadRequest {
                    message: "password reset tokens require a target user".to_string(),
                });
            }
            _ => {}
        }

        let raw = generate_raw();
        let record = OneTimeToken {
            hashed_token: digest(&raw),
            kind,
            user_id: subject,
            created_by: issued_by,
            created_at: Utc::now(),
            used: false,
        };
        store.insert_token(&record).await?;

        tracing::info!(
            kind = kind.as_str(),
            subject = ?subject,
            issued_by,
            "one-time token issued"
        );
        Ok(raw)
    }

    /// validate
    ///
    /// True only if the token exists, is unused, is of `kind`, was created less than
    /// the validity window ago, and (for password reset) targets `subject`.
    /// Unknown tokens are a plain `false`, not an error.
    pub async fn validate<S>(
        &self,
        store: &mut S,
        raw: &str,
        kind: TokenKind,
        subject: Option<i64>,
    ) -> Result<bool, Error>
    where
        S: TokenStore + ?Sized,
    {
        self.validate_at(store, raw, kind, subject, Utc::now()).await
    }

    pub async fn validate_at<S>(
        &self,
        store: &mut S,
        raw: &str,
        kind: TokenKind,
        subject: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<bool, Error>
    where
        S: TokenStore + ?Sized,
    {
        let Some(token) = store.find_token(&digest(raw)).await? else {
            return Ok(false);
        };

        Ok(self.accepts(&token, kind, subject, now))
    }

    fn accepts(
        &self,
        token: &OneTimeToken,
        kind: TokenKind,
        subject: Option<i64>,
        now: DateTime<Utc>,
    ) -> bool {
        if token.used || token.kind != kind {
            return false;
        }
        if now >= token.created_at + self.validity {
            return false;
        }
        match kind {
            TokenKind::Registration => true,
            TokenKind::PasswordReset => subject.is_some() && token.user_id == subject,
        }
    }

    /// consume
    ///
    /// Mark the token used. Fails with `InvalidToken` if no unused row matched, which
    /// is what a concurrent redemption that got there first looks like.
    pub async fn consume<S>(&self, store: &mut S, raw: &str) -> Result<(), Error>
    where
        S: TokenStore + ?Sized,
    {
        let affected = store.mark_token_used(&digest(raw)).await?;
        if affected == 0 {
            return Err(Error::InvalidToken);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepository, Repository, RepositoryTx};

    const ADMIN: i64 = 1;

    #[test]
    fn test_digest_is_stable_hex() {
        let d = digest("token");
        assert_eq!(d.len(), 64);
        assert_eq!(d, digest("token"));
        assert_ne!(d, digest("token2"));
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_raw_tokens_are_url_safe_and_unique() {
        let a = generate_raw();
        let b = generate_raw();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_issue_validate_consume() {
        let repo = MemoryRepository::new();
        let svc = OneTimeTokenService::default();
        let mut tx = repo.begin().await.unwrap();

        let raw = svc
            .issue(&mut *tx, TokenKind::Registration, None, ADMIN)
            .await
            .unwrap();
        assert!(
            svc.validate(&mut *tx, &raw, TokenKind::Registration, None)
                .await
                .unwrap()
        );

        svc.consume(&mut *tx, &raw).await.unwrap();
        assert!(
            !svc.validate(&mut *tx, &raw, TokenKind::Registration, None)
                .await
                .unwrap()
        );
        assert!(matches!(
            svc.consume(&mut *tx, &raw).await,
            Err(Error::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_only_digest_is_stored() {
        let repo = MemoryRepository::new();
        let svc = OneTimeTokenService::default();
        let mut tx = repo.begin().await.unwrap();
        let raw = svc
            .issue(&mut *tx, TokenKind::Registration, None, ADMIN)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(repo.token(&raw).await.is_none());
        let stored = repo.token(&digest(&raw)).await.unwrap();
        assert_eq!(stored.created_by, ADMIN);
        assert!(!stored.used);
    }

    #[tokio::test]
    async fn test_validity_window_boundary() {
        let repo = MemoryRepository::new();
        let svc = OneTimeTokenService::default();
        let mut tx = repo.begin().await.unwrap();
        let raw = svc
            .issue(&mut *tx, TokenKind::Registration, None, ADMIN)
            .await
            .unwrap();
        let created = tx.find_token(&digest(&raw)).await.unwrap().unwrap().created_at;

        let just_inside = created + Duration::hours(23) + Duration::minutes(59);
        let just_outside = created + Duration::hours(24) + Duration::minutes(1);
        let exactly = created + Duration::hours(24);

        for (now, expected) in [(just_inside, true), (exactly, false), (just_outside, false)] {
            let ok = svc
                .validate_at(&mut *tx, &raw, TokenKind::Registration, None, now)
                .await
                .unwrap();
            assert_eq!(ok, expected, "at {now}");
        }
    }

    #[tokio::test]
    async fn test_wrong_kind_is_rejected() {
        let repo = MemoryRepository::new();
        let svc = OneTimeTokenService::default();
        let mut tx = repo.begin().await.unwrap();
        let raw = svc
            .issue(&mut *tx, TokenKind::PasswordReset, Some(42), ADMIN)
            .await
            .unwrap();

        assert!(
            !svc.validate(&mut *tx, &raw, TokenKind::Registration, None)
                .await
                .unwrap()
        );

        let registration = svc
            .issue(&mut *tx, TokenKind::Registration, None, ADMIN)
            .await
            .unwrap();
        assert!(
            !svc.validate(&mut *tx, &registration, TokenKind::PasswordReset, Some(42))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_reset_token_is_bound_to_its_subject() {
        let repo = MemoryRepository::new();
        let svc = OneTimeTokenService::default();
        let mut tx = repo.begin().await.unwrap();
        let raw = svc
            .issue(&mut *tx, TokenKind::PasswordReset, Some(42), ADMIN)
            .await
            .unwrap();

        assert!(
            !svc.validate(&mut *tx, &raw, TokenKind::PasswordReset, Some(99))
                .await
                .unwrap()
        );
        assert!(
            !svc.validate(&mut *tx, &raw, TokenKind::PasswordReset, None)
                .await
                .unwrap()
        );
        assert!(
            svc.validate(&mut *tx, &raw, TokenKind::PasswordReset, Some(42))
                .await
                .unwrap()
        );

        svc.consume(&mut *tx, &raw).await.unwrap();
        assert!(
            !svc.validate(&mut *tx, &raw, TokenKind::PasswordReset, Some(42))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_subject_rules_on_issue() {
        let repo = MemoryRepository::new();
        let svc = OneTimeTokenService::default();
        let mut tx = repo.begin().await.unwrap();

        assert!(matches!(
            svc.issue(&mut *tx, TokenKind::Registration, Some(5), ADMIN).await,
            Err(Error::BadRequest { .. })
        ));
        assert!(matches!(
            svc.issue(&mut *tx, TokenKind::PasswordReset, None, ADMIN).await,
            Err(Error::BadRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_an_error() {
        let repo = MemoryRepository::new();
        let svc = OneTimeTokenService::default();
        let mut tx = repo.begin().await.unwrap();

        assert!(
            !svc.validate(&mut *tx, "never-issued", TokenKind::Registration, None)
                .await
                .unwrap()
        );
    }
}
