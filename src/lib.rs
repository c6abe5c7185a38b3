use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services: credentials, tokens, sessions, link synchronization.
pub mod accounts;
pub mod associations;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing segregated by access tier (Public, Authenticated, Admin).
pub mod routes;
use auth::{AdminUser, AuthUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{OneTimeTokenService, PasswordHasher, SessionState, SessionTokenService};
pub use config::AppConfig;
pub use error::Error;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::register_user, handlers::edit_password,
        handlers::create_article, handlers::edit_article,
        handlers::create_project, handlers::edit_project,
        handlers::issue_registration_token, handlers::issue_reset_token
    ),
    components(
        schemas(
            models::LoginRequest, models::RegisterRequest, models::EditPasswordRequest,
            models::LinkedEntityFields, models::CreateArticleRequest, models::CreateProjectRequest,
            models::EditLinkedEntityRequest, models::TokenResponse, models::MessageResponse,
            models::CreatedResponse, auth::Role,
        )
    ),
    tags(
        (name = "platform-registry", description = "Platform registry API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The **Unified State Pattern**: one cloneable container for every shared service
/// and the configuration, handed to the router once.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    pub sessions: SessionState,
    pub tokens: OneTimeTokenService,
    pub hasher: PasswordHasher,
    pub config: AppConfig,
}

impl AppState {
    /// Build the state from a loaded configuration, failing on an unusable
    /// session secret, issuer or lifetime.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, Error> {
        let sessions = SessionTokenService::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            chrono::Duration::hours(config.session_ttl_hours),
        )
        .map_err(|e| Error::Internal {
            operation: format!("configure sessions: {e}"),
        })?;

        Ok(Self {
            repo,
            sessions: Arc::new(sessions),
            tokens: OneTimeTokenService::default(),
            hasher: PasswordHasher::new()?,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` can be extracted.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// 401 without a valid session, 403 with a non-admin one.
async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, applies the scoped auth layers and the global
/// observability stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Correlation header shared by the request-id layers below.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routes
    let base_router = Router::new()
        // OpenAPI document and Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Session required.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Session required, then the admin role.
        .nest(
            "/api/v1/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Assign an x-request-id to every request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One span per request, tagged with that id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo the id back on the response.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS outermost
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying the `x-request-id`, so every log line of one
/// request can be correlated. The query string is left out because it may hold a
/// raw one-time token.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
