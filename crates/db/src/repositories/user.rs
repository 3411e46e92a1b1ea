//! User repository (the user directory).

use std::sync::Arc;

use crate::entities::{User, user};
use crate::repositories::is_unique_violation;
use chrono::Utc;
use f4f_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find users by IDs, ordered by ID.
    pub async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        User::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(user::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by provider identity.
    pub async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::ExternalId.eq(external_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All users except `exclude_id`, in insertion order.
    pub async fn list_others(&self, exclude_id: i32) -> AppResult<Vec<user::Model>> {
        User::find()
            .filter(user::Column::Id.ne(exclude_id))
            .order_by_asc(user::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or refresh the user for a provider identity.
    ///
    /// A new user gets a fresh ID and the current UTC time as `created_at`.
    /// An existing user keeps both and only has its display name and avatar
    /// overwritten. Losing an insert race against a concurrent first login
    /// falls back to refreshing the row the other request created.
    pub async fn upsert_from_login(
        &self,
        external_id: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> AppResult<user::Model> {
        if let Some(existing) = self.find_by_external_id(external_id).await? {
            return self.refresh_profile(existing, display_name, avatar_url).await;
        }

        let model = user::ActiveModel {
            external_id: Set(external_id.to_string()),
            display_name: Set(display_name.to_string()),
            avatar_url: Set(avatar_url.map(ToString::to_string)),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        match model.insert(self.db.as_ref()).await {
            Ok(created) => {
                tracing::info!(user_id = created.id, external_id = %external_id, "Created user");
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .find_by_external_id(external_id)
                    .await?
                    .ok_or_else(|| AppError::Database(e.to_string()))?;
                self.refresh_profile(existing, display_name, avatar_url).await
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn refresh_profile(
        &self,
        existing: user::Model,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = existing.into();
        active.display_name = Set(display_name.to_string());
        active.avatar_url = Set(avatar_url.map(ToString::to_string));

        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tracing::info!(user_id = updated.id, "Refreshed user profile");
        Ok(updated)
    }
}
