//! API endpoints.

mod auth;
mod following;
mod users;

use axum::{Router, routing::get};

use crate::middleware::AppState;

/// Liveness probe.
async fn index() -> &'static str {
    "Backend is running."
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .nest("/auth", auth::router())
        .nest("/api", users::router().merge(following::router()))
}
