//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use f4f_common::{AppError, Config};
use f4f_core::{FollowSyncService, IdentityProviderClient, UserService};
use uuid::Uuid;

use crate::extractors::SessionUser;
use crate::session::SessionStore;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub follow_sync_service: FollowSyncService,
    pub identity: IdentityProviderClient,
    pub sessions: SessionStore,
    pub config: Arc<Config>,
}

/// Authentication middleware.
///
/// Resolves the session cookie to the user and the provider credential.
/// Requests without a valid session pass through unauthenticated.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let session_id = jar
        .get(&state.config.session.cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    if let Some(session_id) = session_id {
        if let Some(session) = state.sessions.get(session_id).await {
            match state.user_service.get_by_id(session.user_id).await {
                Ok(user) => {
                    req.extensions_mut().insert(SessionUser {
                        session_id,
                        user,
                        credential: session.credential,
                    });
                }
                Err(AppError::UserNotFound(_)) => {
                    tracing::debug!(user_id = session.user_id, "Dropping session of vanished user");
                    state.sessions.remove(session_id).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve session user");
                }
            }
        }
    }

    next.run(req).await
}
