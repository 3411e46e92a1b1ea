//! User service.

use f4f_common::AppResult;
use f4f_db::{entities::user, repositories::UserRepository};

use super::identity::LoginProfile;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Record a completed login, creating the user on first sight.
    pub async fn upsert_from_login(&self, profile: &LoginProfile) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .upsert_from_login(
                &profile.external_id,
                &profile.display_name,
                profile.avatar_url.as_deref(),
            )
            .await?;

        tracing::debug!(user_id = user.id, screen_name = %user.display_name, "Login recorded");
        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i32) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }
}
