//! Following endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use f4f_common::{AppError, AppResult};
use f4f_core::FollowAction;
use f4f_db::entities::user;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, ValidatedJson},
    middleware::AppState,
};

/// Toggle-follow request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFollowRequest {
    #[serde(default, alias = "user_id", alias = "target_user_id")]
    #[validate(range(min = 1))]
    pub target_user_id: Option<i32>,
}

/// Toggle-follow response.
#[derive(Debug, Serialize)]
pub struct ToggleFollowResponse {
    pub message: String,
    pub status: FollowAction,
}

/// A mutual follower.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualEntry {
    pub id: i32,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<user::Model> for MutualEntry {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
        }
    }
}

/// Follow the target if not yet followed, otherwise unfollow.
async fn toggle_follow(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ToggleFollowRequest>,
) -> AppResult<Json<ToggleFollowResponse>> {
    let target_user_id = req.target_user_id.ok_or_else(|| {
        AppError::BadRequest("Missing targetUserId for follow/unfollow action".to_string())
    })?;

    // Detached from the request future: a client disconnect must not abort
    // between the provider call and the local write.
    let service = state.follow_sync_service.clone();
    let acting_user_id = session.user.id;
    let credential = session.credential;
    let outcome = tokio::spawn(async move {
        service
            .toggle_follow(acting_user_id, target_user_id, Some(&credential))
            .await
    })
    .await
    .map_err(|e| AppError::Internal(format!("Follow task failed: {e}")))??;

    Ok(Json(ToggleFollowResponse {
        message: outcome.message(),
        status: outcome.action,
    }))
}

/// List users that follow the viewer back.
async fn mutuals(
    AuthUser(session): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<MutualEntry>>> {
    let users = state.follow_sync_service.mutuals_of(session.user.id).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow", post(toggle_follow))
        .route("/mutuals", get(mutuals))
}
