use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Registration is still gated, by the
/// one-time token in its query string.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/v1/login
        .route("/api/v1/login", post(handlers::login))
        // POST /api/v1/users/register?token=...
        .route("/api/v1/users/register", post(handlers::register_user))
}
