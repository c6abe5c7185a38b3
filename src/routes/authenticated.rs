use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the session layer added in `create_router`, and
/// each handler additionally takes `AuthUser`, so a route accidentally merged
/// without the layer still rejects anonymous callers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // PUT /api/v1/users/password?token=...
        // Redeems a password-reset token for the session user.
        .route("/api/v1/users/password", put(handlers::edit_password))
        // --- Articles ---
        .route("/api/v1/articles", post(handlers::create_article))
        .route("/api/v1/articles/{id}", put(handlers::edit_article))
        // --- Projects ---
        .route("/api/v1/projects", post(handlers::create_project))
        .route("/api/v1/projects/{id}", put(handlers::edit_project))
}
