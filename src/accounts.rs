//! Account flows: login, registration, password reset and token issuance.
//!
//! Each flow that redeems a one-time token runs validation, consumption and the
//! credential write in a single transaction, so a token is spent if and only if
//! the write it guards is committed. Passwords are hashed on the blocking pool
//! before that transaction opens.

use crate::{
    auth::{OneTimeTokenService, PasswordHasher, Role, SessionTokenService},
    error::Error,
    models::{NewCredential, TokenKind},
    repository::{Repository, RepositoryTx},
};

/// login
///
/// Verify an email/password pair and issue a session token. An unknown email and a
/// wrong password produce the same `Unauthenticated` error.
pub async fn login(
    repo: &dyn Repository,
    hasher: &PasswordHasher,
    sessions: &SessionTokenService,
    email: &str,
    password: &str,
) -> Result<String, Error> {
    let Some(credential) = repo.find_credential_by_email(email).await? else {
        tracing::info!("login rejected: unknown email");
        return Err(Error::Unauthenticated);
    };

    if !hasher
        .spawn_verify(&credential.password_hash, password)
        .await?
    {
        tracing::info!(user_id = credential.id, "login rejected: wrong password");
        return Err(Error::Unauthenticated);
    }

    let token = sessions.issue(credential.id, credential.role)?;
    tracing::info!(user_id = credential.id, role = %credential.role, "login succeeded");
    Ok(token)
}

fn require_non_empty(value: &str, field: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

/// register
///
/// Redeem a registration token and create a `user` account. Returns the new id.
pub async fn register(
    repo: &dyn Repository,
    hasher: &PasswordHasher,
    tokens: &OneTimeTokenService,
    raw_token: &str,
    email: &str,
    password: &str,
) -> Result<i64, Error> {
    require_non_empty(email, "email")?;
    require_non_empty(password, "password")?;
    let password_hash = hasher.spawn_hash(password).await?;

    let mut tx = repo.begin().await?;

    if !tokens
        .validate(&mut *tx, raw_token, TokenKind::Registration, None)
        .await?
    {
        return Err(Error::InvalidToken);
    }

    if !tx.email_available(email).await? {
        return Err(Error::Conflict {
            message: "an account with this email address is already in use".to_string(),
        });
    }

    tokens.consume(&mut *tx, raw_token).await?;

    let user_id = tx
        .insert_credential(&NewCredential {
            email: email.to_string(),
            password_hash,
            role: Role::User,
        })
        .await?;

    tx.commit().await?;

    tracing::info!(user_id, "user registered");
    Ok(user_id)
}

/// reset_password
///
/// Redeem a password-reset token on behalf of the session user `user_id`. The token
/// must have been issued for that same user.
pub async fn reset_password(
    repo: &dyn Repository,
    hasher: &PasswordHasher,
    tokens: &OneTimeTokenService,
    raw_token: &str,
    user_id: i64,
    new_password: &str,
) -> Result<(), Error> {
    require_non_empty(new_password, "password")?;
    let password_hash = hasher.spawn_hash(new_password).await?;

    let mut tx = repo.begin().await?;

    if !tokens
        .validate(&mut *tx, raw_token, TokenKind::PasswordReset, Some(user_id))
        .await?
    {
        return Err(Error::InvalidToken);
    }

    tokens.consume(&mut *tx, raw_token).await?;

    if tx.update_password(user_id, &password_hash).await? == 0 {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    tx.commit().await?;

    tracing::info!(user_id, "password reset");
    Ok(())
}

/// issue_registration_token
///
/// Admin action: mint a registration token. The raw value is returned once.
pub async fn issue_registration_token(
    repo: &dyn Repository,
    tokens: &OneTimeTokenService,
    admin_id: i64,
) -> Result<String, Error> {
    let mut tx = repo.begin().await?;
    let raw = tokens
        .issue(&mut *tx, TokenKind::Registration, None, admin_id)
        .await?;
    tx.commit().await?;
    Ok(raw)
}

/// issue_reset_token
///
/// Admin action: mint a password-reset token bound to `user_id`.
pub async fn issue_reset_token(
    repo: &dyn Repository,
    tokens: &OneTimeTokenService,
    admin_id: i64,
    user_id: i64,
) -> Result<String, Error> {
    let mut tx = repo.begin().await?;

    if !tx.user_exists(user_id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    let raw = tokens
        .issue(&mut *tx, TokenKind::PasswordReset, Some(user_id), admin_id)
        .await?;
    tx.commit().await?;
    Ok(raw)
}
