use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

/// PersistenceError
///
/// Failures raised by the store underneath the core. These are propagated to the
/// caller unmodified and never retried; any open transaction is rolled back when
/// its scope object is dropped.
#[derive(ThisError, Debug)]
pub enum PersistenceError {
    /// A unique constraint rejected the write (e.g. `users_email_key`).
    #[error("unique constraint violation on {constraint}")]
    UniqueViolation { constraint: String },

    /// Any other database failure.
    #[error(transparent)]
    Database(sqlx::Error),

    /// Failure raised by a non-SQL store (the in-memory repository).
    #[error("store failure: {message}")]
    Store { message: String },
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return PersistenceError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        PersistenceError::Database(err)
    }
}

/// Error
///
/// The application-wide error taxonomy. Handlers return `Result<_, Error>` and the
/// `IntoResponse` impl below turns each variant into its HTTP status.
///
/// Authentication failures are deliberately coarse: the caller only ever learns
/// that a session or token was rejected, never why.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed caller input (missing password, empty email...).
    #[error("{message}")]
    BadRequest { message: String },

    /// Missing, tampered, expired or otherwise invalid session.
    #[error("not authenticated")]
    Unauthenticated,

    /// One-time token that is unknown, expired, consumed or of the wrong kind.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Authenticated, but the role does not grant access.
    #[error("insufficient permissions")]
    Forbidden,

    #[error("{message}")]
    Conflict { message: String },

    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Hashing or signing failed.
    #[error("failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } | Error::InvalidToken => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Persistence(PersistenceError::UniqueViolation { .. }) => StatusCode::CONFLICT,
            Error::Persistence(_) | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the client; internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Persistence(PersistenceError::UniqueViolation { constraint })
                if constraint.contains("email") =>
            {
                "an account with this email address is already in use".to_string()
            }
            Error::Persistence(PersistenceError::UniqueViolation { .. }) => {
                "resource already exists".to_string()
            }
            Error::Persistence(_) | Error::Internal { .. } => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Persistence(PersistenceError::UniqueViolation { .. }) => {
                tracing::warn!("Constraint error: {}", self);
            }
            Error::Persistence(_) | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Unauthenticated | Error::Forbidden | Error::InvalidToken => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Conflict { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), Json(json!({ "error": self.user_message() }))).into_response()
    }
}
