//! Follow edge repository (the relationship store).

use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{FollowEdge, follow_edge};
use crate::repositories::is_unique_violation;
use chrono::Utc;
use f4f_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};

/// Follow edge repository for database operations.
#[derive(Clone)]
pub struct FollowEdgeRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowEdgeRepository {
    /// Create a new follow edge repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an edge by follower and following.
    pub async fn find_by_pair(
        &self,
        follower_id: i32,
        following_id: i32,
    ) -> AppResult<Option<follow_edge::Model>> {
        FollowEdge::find()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FollowingId.eq(following_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if `follower_id` follows `following_id`.
    pub async fn exists(&self, follower_id: i32, following_id: i32) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, following_id).await?.is_some())
    }

    /// Insert a new edge.
    ///
    /// The unique index on the pair decides races: the losing insert gets
    /// [`AppError::Conflict`].
    pub async fn create(
        &self,
        follower_id: i32,
        following_id: i32,
    ) -> AppResult<follow_edge::Model> {
        let model = follow_edge::ActiveModel {
            follower_id: Set(follower_id),
            following_id: Set(following_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.insert(self.db.as_ref()).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "User {follower_id} already follows user {following_id}"
                ))
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Delete the edge for a pair in a single statement.
    pub async fn delete(&self, follower_id: i32, following_id: i32) -> AppResult<()> {
        let result = FollowEdge::delete_many()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FollowingId.eq(following_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "User {follower_id} does not follow user {following_id}"
            )));
        }
        Ok(())
    }

    /// IDs of the users `user_id` follows.
    pub async fn following_ids_of(&self, user_id: i32) -> AppResult<HashSet<i32>> {
        let ids: Vec<i32> = FollowEdge::find()
            .select_only()
            .column(follow_edge::Column::FollowingId)
            .filter(follow_edge::Column::FollowerId.eq(user_id))
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(ids.into_iter().collect())
    }

    /// IDs of the users following `user_id`.
    pub async fn follower_ids_of(&self, user_id: i32) -> AppResult<HashSet<i32>> {
        let ids: Vec<i32> = FollowEdge::find()
            .select_only()
            .column(follow_edge::Column::FollowerId)
            .filter(follow_edge::Column::FollowingId.eq(user_id))
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(ids.into_iter().collect())
    }
}
