//! User endpoints.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, FixedOffset};
use f4f_common::AppResult;
use f4f_core::AnnotatedUser;
use f4f_db::entities::user;
use serde::Serialize;

use crate::{extractors::AuthUser, middleware::AppState};

/// The logged-in user's profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: i32,
    pub external_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub joined_at: DateTime<FixedOffset>,
}

impl From<user::Model> for MeResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            external_id: user.external_id,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            joined_at: user.created_at,
        }
    }
}

/// Another user, with follow flags relative to the viewer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListEntry {
    pub id: i32,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_followed: bool,
    pub follows_me: bool,
    pub mutual: bool,
}

impl From<AnnotatedUser> for UserListEntry {
    fn from(entry: AnnotatedUser) -> Self {
        Self {
            id: entry.user.id,
            display_name: entry.user.display_name,
            avatar_url: entry.user.avatar_url,
            is_followed: entry.is_followed_by_viewer,
            follows_me: entry.follows_viewer,
            mutual: entry.is_mutual,
        }
    }
}

/// Get the current user.
async fn me(AuthUser(session): AuthUser) -> Json<MeResponse> {
    Json(session.user.into())
}

/// List every other user.
async fn list_users(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserListEntry>>> {
    let users = state
        .follow_sync_service
        .annotated_others(session.user.id)
        .await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/users", get(list_users))
}
