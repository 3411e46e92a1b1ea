//! Follow synchronization service.
//!
//! Toggles a follow edge on the provider first and mirrors the result into
//! the local relationship store, and answers the listing/mutual queries.

use f4f_common::{AppError, AppResult};
use f4f_db::{
    entities::user,
    repositories::{FollowEdgeRepository, UserRepository},
};
use serde::Serialize;
use tracing::{error, info, warn};

use super::remote_graph::{RemoteCredential, RemoteGraphClient};

/// Direction of a completed toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Followed,
    Unfollowed,
}

impl FollowAction {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Followed => "followed",
            Self::Unfollowed => "unfollowed",
        }
    }
}

/// Result of [`FollowSyncService::toggle_follow`].
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub action: FollowAction,
    pub target: user::Model,
}

impl ToggleOutcome {
    /// Human-readable summary, e.g. `Successfully followed @bob`.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Successfully {} @{}",
            self.action.as_str(),
            self.target.display_name
        )
    }
}

/// A user as seen by a viewer.
#[derive(Debug, Clone)]
pub struct AnnotatedUser {
    pub user: user::Model,
    /// The viewer follows this user.
    pub is_followed_by_viewer: bool,
    /// This user follows the viewer.
    pub follows_viewer: bool,
    pub is_mutual: bool,
}

/// Follow synchronization service.
#[derive(Clone)]
pub struct FollowSyncService {
    user_repo: UserRepository,
    edge_repo: FollowEdgeRepository,
    remote: RemoteGraphClient,
}

impl FollowSyncService {
    /// Create a new follow synchronization service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        edge_repo: FollowEdgeRepository,
        remote: RemoteGraphClient,
    ) -> Self {
        Self {
            user_repo,
            edge_repo,
            remote,
        }
    }

    /// Follow `target_user_id` if not yet followed, otherwise unfollow.
    ///
    /// The provider is called before the local store is touched; a remote
    /// failure leaves local state unchanged.
    pub async fn toggle_follow(
        &self,
        acting_user_id: i32,
        target_user_id: i32,
        credential: Option<&RemoteCredential>,
    ) -> AppResult<ToggleOutcome> {
        if acting_user_id == target_user_id {
            return Err(AppError::SelfFollow);
        }

        let target = self
            .user_repo
            .find_by_id(target_user_id)
            .await?
            .ok_or_else(|| AppError::TargetNotFound(target_user_id.to_string()))?;

        let credential = credential
            .filter(|c| c.is_usable())
            .ok_or(AppError::RemoteAuthMissing)?;

        if self.edge_repo.exists(acting_user_id, target.id).await? {
            self.unfollow(acting_user_id, target, credential).await
        } else {
            self.follow(acting_user_id, target, credential).await
        }
    }

    async fn follow(
        &self,
        acting_user_id: i32,
        target: user::Model,
        credential: &RemoteCredential,
    ) -> AppResult<ToggleOutcome> {
        self.remote
            .create_relationship(credential, &target.display_name)
            .await?;

        match self.edge_repo.create(acting_user_id, target.id).await {
            Ok(_) => {}
            Err(AppError::Conflict(detail)) => {
                warn!(acting_user_id, target_user_id = target.id, "Concurrent follow already recorded");
                return Err(AppError::Conflict(detail));
            }
            Err(e) => return Err(partial_sync("follow", acting_user_id, target.id, &e)),
        }

        info!(acting_user_id, target_user_id = target.id, "Followed user");
        Ok(ToggleOutcome {
            action: FollowAction::Followed,
            target,
        })
    }

    async fn unfollow(
        &self,
        acting_user_id: i32,
        target: user::Model,
        credential: &RemoteCredential,
    ) -> AppResult<ToggleOutcome> {
        self.remote
            .destroy_relationship(credential, &target.display_name)
            .await?;

        match self.edge_repo.delete(acting_user_id, target.id).await {
            Ok(()) => {}
            Err(AppError::NotFound(detail)) => {
                warn!(acting_user_id, target_user_id = target.id, "Concurrent unfollow already recorded");
                return Err(AppError::Conflict(detail));
            }
            Err(e) => return Err(partial_sync("unfollow", acting_user_id, target.id, &e)),
        }

        info!(acting_user_id, target_user_id = target.id, "Unfollowed user");
        Ok(ToggleOutcome {
            action: FollowAction::Unfollowed,
            target,
        })
    }

    /// Every user except the viewer, with follow flags relative to the viewer.
    pub async fn annotated_others(&self, viewer_id: i32) -> AppResult<Vec<AnnotatedUser>> {
        let others = self.user_repo.list_others(viewer_id).await?;
        let following = self.edge_repo.following_ids_of(viewer_id).await?;
        let followers = self.edge_repo.follower_ids_of(viewer_id).await?;

        Ok(others
            .into_iter()
            .map(|user| {
                let is_followed_by_viewer = following.contains(&user.id);
                let follows_viewer = followers.contains(&user.id);
                AnnotatedUser {
                    user,
                    is_followed_by_viewer,
                    follows_viewer,
                    is_mutual: is_followed_by_viewer && follows_viewer,
                }
            })
            .collect())
    }

    /// Users that follow the viewer and are followed back, by ascending ID.
    pub async fn mutuals_of(&self, viewer_id: i32) -> AppResult<Vec<user::Model>> {
        let following = self.edge_repo.following_ids_of(viewer_id).await?;
        let followers = self.edge_repo.follower_ids_of(viewer_id).await?;

        let mut ids: Vec<i32> = following.intersection(&followers).copied().collect();
        ids.sort_unstable();

        self.user_repo.find_by_ids(&ids).await
    }
}

/// Remote state changed but the local write failed for a reason other than a race.
fn partial_sync(branch: &str, acting_user_id: i32, target_user_id: i32, cause: &AppError) -> AppError {
    error!(
        branch,
        acting_user_id,
        target_user_id,
        error = %cause,
        "Provider updated but local follow state was not; reconciliation needed"
    );
    AppError::PartialSync(format!(
        "{branch} of user {target_user_id} by user {acting_user_id} applied remotely only: {cause}"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::remote_graph::{RemoteGraph, RemoteGraphError};
    use async_trait::async_trait;
    use chrono::Utc;
    use f4f_db::{entities::follow_edge, test_utils::TestDatabase};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};
    use std::sync::{Arc, Mutex};

    /// Remote graph double that records calls and optionally fails them.
    #[derive(Default)]
    struct FakeRemote {
        failure: Option<RemoteGraphError>,
        calls: Mutex<Vec<(&'static str, String)>>,
    }

    impl FakeRemote {
        fn failing(err: RemoteGraphError) -> Self {
            Self {
                failure: Some(err),
                ..Default::default()
            }
        }

        fn record(&self, op: &'static str, screen_name: &str) -> Result<(), RemoteGraphError> {
            self.calls.lock().unwrap().push((op, screen_name.to_string()));
            self.failure.clone().map_or(Ok(()), Err)
        }

        fn calls(&self) -> Vec<(&'static str, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteGraph for FakeRemote {
        async fn create_relationship(
            &self,
            _credential: &RemoteCredential,
            screen_name: &str,
        ) -> Result<(), RemoteGraphError> {
            self.record("create", screen_name)
        }

        async fn destroy_relationship(
            &self,
            _credential: &RemoteCredential,
            screen_name: &str,
        ) -> Result<(), RemoteGraphError> {
            self.record("destroy", screen_name)
        }
    }

    fn credential() -> RemoteCredential {
        RemoteCredential::new("token".to_string(), None)
    }

    fn service(db: &TestDatabase, remote: Arc<FakeRemote>) -> FollowSyncService {
        FollowSyncService::new(
            UserRepository::new(db.connection()),
            FollowEdgeRepository::new(db.connection()),
            remote,
        )
    }

    fn edges(db: &TestDatabase) -> FollowEdgeRepository {
        FollowEdgeRepository::new(db.connection())
    }

    #[tokio::test]
    async fn test_self_follow_rejected_without_side_effects() {
        let db = TestDatabase::new().await.unwrap();
        let a = db.seed_user("1", "alice").await.unwrap();
        let remote = Arc::new(FakeRemote::default());
        let svc = service(&db, remote.clone());

        let result = svc.toggle_follow(a.id, a.id, Some(&credential())).await;

        assert!(matches!(result, Err(AppError::SelfFollow)));
        assert!(remote.calls().is_empty());
        assert!(!edges(&db).exists(a.id, a.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_validation_order() {
        let db = TestDatabase::new().await.unwrap();
        let a = db.seed_user("1", "alice").await.unwrap();
        let b = db.seed_user("2", "bob").await.unwrap();
        let remote = Arc::new(FakeRemote::default());
        let svc = service(&db, remote.clone());

        // Self-follow wins over a missing credential.
        assert!(matches!(
            svc.toggle_follow(a.id, a.id, None).await,
            Err(AppError::SelfFollow)
        ));
        // Unknown target wins over a missing credential.
        assert!(matches!(
            svc.toggle_follow(a.id, 999, None).await,
            Err(AppError::TargetNotFound(id)) if id == "999"
        ));
        assert!(matches!(
            svc.toggle_follow(a.id, b.id, None).await,
            Err(AppError::RemoteAuthMissing)
        ));
        let empty = RemoteCredential::new(String::new(), None);
        assert!(matches!(
            svc.toggle_follow(a.id, b.id, Some(&empty)).await,
            Err(AppError::RemoteAuthMissing)
        ));

        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_follows_then_unfollows() {
        let db = TestDatabase::new().await.unwrap();
        let a = db.seed_user("1", "alice").await.unwrap();
        let b = db.seed_user("2", "bob").await.unwrap();
        let remote = Arc::new(FakeRemote::default());
        let svc = service(&db, remote.clone());
        let cred = credential();

        let first = svc.toggle_follow(a.id, b.id, Some(&cred)).await.unwrap();
        assert_eq!(first.action, FollowAction::Followed);
        assert_eq!(first.message(), "Successfully followed @bob");
        assert!(edges(&db).exists(a.id, b.id).await.unwrap());

        let second = svc.toggle_follow(a.id, b.id, Some(&cred)).await.unwrap();
        assert_eq!(second.action, FollowAction::Unfollowed);
        assert_eq!(second.message(), "Successfully unfollowed @bob");
        assert!(!edges(&db).exists(a.id, b.id).await.unwrap());

        assert_eq!(
            remote.calls(),
            vec![("create", "bob".to_string()), ("destroy", "bob".to_string())]
        );
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_no_edge() {
        let db = TestDatabase::new().await.unwrap();
        let a = db.seed_user("1", "alice").await.unwrap();
        let b = db.seed_user("2", "bob").await.unwrap();
        let remote = Arc::new(FakeRemote::failing(RemoteGraphError::Rejected {
            status: 403,
            detail: "blocked".to_string(),
        }));
        let svc = service(&db, remote);

        let result = svc.toggle_follow(a.id, b.id, Some(&credential())).await;

        match result {
            Err(AppError::RemoteSync { status, detail }) => {
                assert_eq!(status, 403);
                assert_eq!(detail, "blocked");
            }
            other => panic!("Expected RemoteSync, got {other:?}"),
        }
        assert!(!edges(&db).exists(a.id, b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_existing_edge() {
        let db = TestDatabase::new().await.unwrap();
        let a = db.seed_user("1", "alice").await.unwrap();
        let b = db.seed_user("2", "bob").await.unwrap();
        db.seed_edge(a.id, b.id).await.unwrap();
        let remote = Arc::new(FakeRemote::failing(RemoteGraphError::Transport(
            "timed out".to_string(),
        )));
        let svc = service(&db, remote);

        let result = svc.toggle_follow(a.id, b.id, Some(&credential())).await;

        assert!(matches!(
            result,
            Err(AppError::RemoteSync { status: 502, .. })
        ));
        assert!(edges(&db).exists(a.id, b.id).await.unwrap());
    }

    fn mock_user(id: i32, name: &str) -> user::Model {
        user::Model {
            id,
            external_id: id.to_string(),
            display_name: name.to_string(),
            avatar_url: None,
            created_at: Utc::now().into(),
        }
    }

    fn mock_service(db: sea_orm::DatabaseConnection, remote: Arc<FakeRemote>) -> FollowSyncService {
        let db = Arc::new(db);
        FollowSyncService::new(
            UserRepository::new(db.clone()),
            FollowEdgeRepository::new(db),
            remote,
        )
    }

    #[tokio::test]
    async fn test_local_insert_failure_after_remote_follow_is_partial_sync() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[mock_user(2, "bob")]])
            .append_query_results([Vec::<follow_edge::Model>::new()])
            .append_query_errors([DbErr::Custom("disk full".to_string())])
            .into_connection();
        let remote = Arc::new(FakeRemote::default());
        let svc = mock_service(db, remote.clone());

        let result = svc.toggle_follow(1, 2, Some(&credential())).await;

        assert!(matches!(result, Err(AppError::PartialSync(_))));
        assert_eq!(remote.calls(), vec![("create", "bob".to_string())]);
    }

    #[tokio::test]
    async fn test_local_delete_failure_after_remote_unfollow_is_partial_sync() {
        let edge = follow_edge::Model {
            id: 7,
            follower_id: 1,
            following_id: 2,
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[mock_user(2, "bob")]])
            .append_query_results([[edge]])
            .append_exec_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let remote = Arc::new(FakeRemote::default());
        let svc = mock_service(db, remote.clone());

        let result = svc.toggle_follow(1, 2, Some(&credential())).await;

        assert!(matches!(result, Err(AppError::PartialSync(_))));
        assert_eq!(remote.calls(), vec![("destroy", "bob".to_string())]);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_resolve_consistently() {
        let db = TestDatabase::new().await.unwrap();
        let a = db.seed_user("1", "alice").await.unwrap();
        let b = db.seed_user("2", "bob").await.unwrap();
        let svc = service(&db, Arc::new(FakeRemote::default()));
        let cred = credential();

        let (r1, r2) = tokio::join!(
            svc.toggle_follow(a.id, b.id, Some(&cred)),
            svc.toggle_follow(a.id, b.id, Some(&cred)),
        );

        let followed = [&r1, &r2]
            .iter()
            .filter(|r| matches!(r, Ok(o) if o.action == FollowAction::Followed))
            .count();
        let unfollowed = [&r1, &r2]
            .iter()
            .filter(|r| matches!(r, Ok(o) if o.action == FollowAction::Unfollowed))
            .count();
        let conflicts = [&r1, &r2]
            .iter()
            .filter(|r| matches!(r, Err(AppError::Conflict(_))))
            .count();

        assert_eq!(followed + unfollowed + conflicts, 2);
        assert!(followed >= 1);
        // The edge exists exactly when the follows outnumber the unfollows.
        assert_eq!(
            edges(&db).exists(a.id, b.id).await.unwrap(),
            followed > unfollowed
        );
    }

    #[tokio::test]
    async fn test_mutuals_and_annotations() {
        let db = TestDatabase::new().await.unwrap();
        let u1 = db.seed_user("1", "one").await.unwrap();
        let u2 = db.seed_user("2", "two").await.unwrap();
        let u3 = db.seed_user("3", "three").await.unwrap();
        db.seed_edge(u1.id, u2.id).await.unwrap();
        db.seed_edge(u2.id, u1.id).await.unwrap();
        db.seed_edge(u1.id, u3.id).await.unwrap();
        let svc = service(&db, Arc::new(FakeRemote::default()));

        let mutual_ids: Vec<i32> = svc
            .mutuals_of(u1.id)
            .await
            .unwrap()
            .iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(mutual_ids, vec![u2.id]);
        assert!(svc.mutuals_of(u3.id).await.unwrap().is_empty());

        let listing = svc.annotated_others(u1.id).await.unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|a| a.user.id != u1.id));
        for entry in &listing {
            assert_eq!(
                entry.is_mutual,
                entry.is_followed_by_viewer && entry.follows_viewer
            );
        }
        let two = listing.iter().find(|a| a.user.id == u2.id).unwrap();
        assert!(two.is_followed_by_viewer && two.follows_viewer && two.is_mutual);
        let three = listing.iter().find(|a| a.user.id == u3.id).unwrap();
        assert!(three.is_followed_by_viewer && !three.follows_viewer && !three.is_mutual);

        let from_three = svc.annotated_others(u3.id).await.unwrap();
        let one = from_three.iter().find(|a| a.user.id == u1.id).unwrap();
        assert!(!one.is_followed_by_viewer && one.follows_viewer && !one.is_mutual);
    }

    #[tokio::test]
    async fn test_mutual_follow_scenario() {
        let db = TestDatabase::new().await.unwrap();
        let alice = db.seed_user("100", "alice").await.unwrap();
        let bob = db.seed_user("200", "bob").await.unwrap();
        let remote = Arc::new(FakeRemote::default());
        let svc = service(&db, remote.clone());
        let cred = credential();

        svc.toggle_follow(alice.id, bob.id, Some(&cred)).await.unwrap();
        assert!(svc.mutuals_of(alice.id).await.unwrap().is_empty());

        svc.toggle_follow(bob.id, alice.id, Some(&cred)).await.unwrap();
        let mutuals = svc.mutuals_of(alice.id).await.unwrap();
        assert_eq!(mutuals.len(), 1);
        assert_eq!(mutuals[0].id, bob.id);

        let unfollow = svc.toggle_follow(alice.id, bob.id, Some(&cred)).await.unwrap();
        assert_eq!(unfollow.action, FollowAction::Unfollowed);
        assert!(svc.mutuals_of(alice.id).await.unwrap().is_empty());
        let from_bob = svc.annotated_others(bob.id).await.unwrap();
        assert!(from_bob[0].is_followed_by_viewer && !from_bob[0].follows_viewer);

        assert_eq!(remote.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_remote_calls_use_name_from_latest_login() {
        let db = TestDatabase::new().await.unwrap();
        let alice = db.seed_user("100", "alice").await.unwrap();
        let bob = db.seed_user("200", "bob").await.unwrap();
        let remote = Arc::new(FakeRemote::default());
        let svc = service(&db, remote.clone());

        // Bob was renamed on the provider, then logged in again.
        UserRepository::new(db.connection())
            .upsert_from_login("200", "robert", None)
            .await
            .unwrap();

        let outcome = svc
            .toggle_follow(alice.id, bob.id, Some(&credential()))
            .await
            .unwrap();

        assert_eq!(outcome.message(), "Successfully followed @robert");
        assert_eq!(remote.calls(), vec![("create", "robert".to_string())]);
    }
}
