use crate::{
    AppState, accounts, associations,
    auth::{AdminUser, AuthUser},
    error::Error,
    models::{
        CreateArticleRequest, CreateProjectRequest, CreatedResponse, EditLinkedEntityRequest,
        EditPasswordRequest, EntityKind, LinkedEntityFields, LoginRequest, MessageResponse,
        RegisterRequest, TokenResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// TokenQuery
///
/// The `?token=` query parameter carrying a raw one-time token.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct TokenQuery {
    /// Raw one-time token as handed out by an admin.
    pub token: String,
}

// --- Public ---

/// login
///
/// [Public Route] Exchanges an email/password pair for a session token.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token", body = TokenResponse),
        (status = 401, description = "Unknown email or wrong password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, Error> {
    let token = accounts::login(
        state.repo.as_ref(),
        &state.hasher,
        &state.sessions,
        &payload.email,
        &payload.password,
    )
    .await?;

    Ok(Json(TokenResponse { token }))
}

/// register_user
///
/// [Public Route] Creates an account by redeeming a registration token.
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    params(TokenQuery),
    request_body = RegisterRequest,
    responses(
        (status = 202, description = "Account created", body = MessageResponse),
        (status = 400, description = "Invalid token or missing fields"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), Error> {
    accounts::register(
        state.repo.as_ref(),
        &state.hasher,
        &state.tokens,
        &query.token,
        &payload.email,
        &payload.password,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "user registered".to_string(),
        }),
    ))
}

// --- Authenticated ---

/// edit_password
///
/// [Authenticated Route] Sets a new password for the session user. The reset
/// token must have been issued for that same user.
#[utoipa::path(
    put,
    path = "/api/v1/users/password",
    params(TokenQuery),
    request_body = EditPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid token or empty password"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn edit_password(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(payload): Json<EditPasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    accounts::reset_password(
        state.repo.as_ref(),
        &state.hasher,
        &state.tokens,
        &query.token,
        id,
        &payload.password,
    )
    .await?;

    Ok(Json(MessageResponse {
        message: "password updated".to_string(),
    }))
}

async fn create_entity(
    state: &AppState,
    kind: EntityKind,
    fields: &LinkedEntityFields,
    tags: &[i64],
    platforms: &[i64],
) -> Result<(StatusCode, Json<CreatedResponse>), Error> {
    if fields.title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "title is required".to_string(),
        });
    }

    let id =
        associations::create_linked_entity(state.repo.as_ref(), kind, fields, tags, platforms)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id,
            message: format!("{} created", kind.resource()),
        }),
    ))
}

async fn edit_entity(
    state: &AppState,
    kind: EntityKind,
    id: i64,
    payload: &EditLinkedEntityRequest,
) -> Result<Json<MessageResponse>, Error> {
    if payload.fields.title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "title is required".to_string(),
        });
    }

    associations::edit_linked_entity(
        state.repo.as_ref(),
        kind,
        id,
        &payload.fields,
        &payload.tags,
        &payload.linked_platforms,
    )
    .await?;

    Ok(Json(MessageResponse {
        message: format!("{} updated", kind.resource()),
    }))
}

/// create_article
///
/// [Authenticated Route] Inserts an article together with its tag and platform links.
#[utoipa::path(
    post,
    path = "/api/v1/articles",
    request_body = CreateArticleRequest,
    responses((status = 201, description = "Article created", body = CreatedResponse))
)]
pub async fn create_article(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), Error> {
    create_entity(
        &state,
        EntityKind::Article,
        &payload.article,
        &payload.tags,
        &payload.linked_platforms,
    )
    .await
}

/// edit_article
///
/// [Authenticated Route] Replaces an article's fields and both link sets atomically.
#[utoipa::path(
    put,
    path = "/api/v1/articles/{id}",
    params(("id" = i64, Path, description = "Article id")),
    request_body = EditLinkedEntityRequest,
    responses(
        (status = 200, description = "Article updated", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_article(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<EditLinkedEntityRequest>,
) -> Result<Json<MessageResponse>, Error> {
    edit_entity(&state, EntityKind::Article, id, &payload).await
}

/// create_project
///
/// [Authenticated Route] Inserts a project together with its tag and platform links.
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = CreateProjectRequest,
    responses((status = 201, description = "Project created", body = CreatedResponse))
)]
pub async fn create_project(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), Error> {
    create_entity(
        &state,
        EntityKind::Project,
        &payload.project,
        &payload.tags,
        &payload.linked_platforms,
    )
    .await
}

/// edit_project
///
/// [Authenticated Route] Replaces a project's fields and both link sets atomically.
#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    params(("id" = i64, Path, description = "Project id")),
    request_body = EditLinkedEntityRequest,
    responses(
        (status = 200, description = "Project updated", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_project(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<EditLinkedEntityRequest>,
) -> Result<Json<MessageResponse>, Error> {
    edit_entity(&state, EntityKind::Project, id, &payload).await
}

// --- Admin ---

/// issue_registration_token
///
/// [Admin Route] Mints a registration token. The raw token appears in this response
/// only; the server keeps its digest.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users/token",
    responses(
        (status = 200, description = "Registration token", body = TokenResponse),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn issue_registration_token(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, Error> {
    let token =
        accounts::issue_registration_token(state.repo.as_ref(), &state.tokens, admin.id).await?;
    Ok(Json(TokenResponse { token }))
}

/// issue_reset_token
///
/// [Admin Route] Mints a password-reset token bound to `user_id`.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{user_id}/resettoken",
    params(("user_id" = i64, Path, description = "Target user id")),
    responses(
        (status = 200, description = "Reset token", body = TokenResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    )
)]
pub async fn issue_reset_token(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<TokenResponse>, Error> {
    let token =
        accounts::issue_reset_token(state.repo.as_ref(), &state.tokens, admin.id, user_id).await?;
    Ok(Json(TokenResponse { token }))
}
