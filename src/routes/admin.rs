use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Token issuance. Nested under `/api/v1/admin` and wrapped by the admin layer in
/// `create_router`; the handlers take `AdminUser` as well.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/v1/admin/users/token
        .route("/users/token", get(handlers::issue_registration_token))
        // GET /api/v1/admin/users/{user_id}/resettoken
        .route(
            "/users/{user_id}/resettoken",
            get(handlers::issue_reset_token),
        )
}
