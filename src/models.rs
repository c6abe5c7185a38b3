use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::auth::role::Role;

// --- Credentials & Tokens (Internal, never serialized) ---

/// Credential
///
/// A row of the `users` table as the auth flows see it. The password hash is
/// write-once-per-change and never leaves the server, so this type is neither
/// `Serialize` nor exported to TypeScript, and its `Debug` output redacts the hash.
#[derive(Clone)]
pub struct Credential {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Fields required to insert a new credential.
#[derive(Clone)]
pub struct NewCredential {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// TokenKind
///
/// The operation a one-time token is good for. Stored in the `type` column of
/// `users_tokens` using the upper-case spelling returned by `as_str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Registration,
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Registration => "REGISTRATION",
            TokenKind::PasswordReset => "PASSWORD_RESET",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REGISTRATION" => Some(TokenKind::Registration),
            "PASSWORD_RESET" => Some(TokenKind::PasswordReset),
            _ => None,
        }
    }
}

/// OneTimeToken
///
/// Server-side record of an issued token. Only the digest is kept; the raw value
/// exists on the server solely for the duration of the request that issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct OneTimeToken {
    pub hashed_token: String,
    pub kind: TokenKind,
    /// The account the token acts on. `None` for registration tokens.
    pub user_id: Option<i64>,
    /// The admin that issued the token.
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub used: bool,
}

// --- Linked Entities (Articles & Projects) ---

/// EntityKind
///
/// Articles and projects share one shape: scalar fields plus tag and platform links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Article,
    Project,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Article => "articles",
            EntityKind::Project => "projects",
        }
    }

    /// Human readable name used in `NotFound` errors.
    pub fn resource(self) -> &'static str {
        match self {
            EntityKind::Article => "Article",
            EntityKind::Project => "Project",
        }
    }
}

/// LinkedEntityFields
///
/// The scalar columns of an article or project.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct LinkedEntityFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    /// Publication date. Legacy records have none.
    #[serde(default)]
    #[ts(type = "string | null")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub body: String,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for POST /api/v1/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for POST /api/v1/users/register. The registration token travels
/// in the query string, not in this body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// EditPasswordRequest
///
/// Input payload for PUT /api/v1/users/password.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EditPasswordRequest {
    pub password: String,
}

/// CreateArticleRequest
///
/// Input payload for POST /api/v1/articles.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateArticleRequest {
    pub article: LinkedEntityFields,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub linked_platforms: Vec<i64>,
}

/// CreateProjectRequest
///
/// Input payload for POST /api/v1/projects.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateProjectRequest {
    pub project: LinkedEntityFields,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub linked_platforms: Vec<i64>,
}

/// EditLinkedEntityRequest
///
/// Full-replacement payload for PUT /api/v1/articles/{id} and PUT /api/v1/projects/{id}.
/// `tags` and `linkedPlatforms` are the complete desired link sets, not a delta:
/// omitting them clears the links.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EditLinkedEntityRequest {
    #[serde(flatten)]
    pub fields: LinkedEntityFields,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub linked_platforms: Vec<i64>,
}

// --- Response Payloads (Output Schemas) ---

/// TokenResponse
///
/// Carries either a session token (login) or a raw one-time token (admin issuance).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// CreatedResponse
///
/// Returned by the create endpoints so the client can navigate to the new record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatedResponse {
    pub id: i64,
    pub message: String,
}
