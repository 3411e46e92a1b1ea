//! Server-side login sessions.
//!
//! The browser only ever holds an opaque session ID; the user ID and the
//! provider credential stay in this in-memory map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use f4f_core::RemoteCredential;
use tokio::sync::RwLock;
use uuid::Uuid;

/// How long an authorization round-trip may take before its state expires.
const PENDING_LOGIN_TTL: Duration = Duration::from_secs(600);

/// Session lifetime when none is configured.
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A logged-in browser session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i32,
    pub credential: RemoteCredential,
}

#[derive(Debug, Clone)]
struct StoredSession {
    session: Session,
    created_at: Instant,
}

/// An authorization request awaiting the provider callback.
#[derive(Debug, Clone)]
struct PendingLogin {
    code_verifier: String,
    started_at: Instant,
}

impl PendingLogin {
    fn is_expired(&self) -> bool {
        self.started_at.elapsed() > PENDING_LOGIN_TTL
    }
}

/// In-memory session store.
///
/// Sessions expire `ttl` after login; expired entries are pruned whenever a
/// new session is opened.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, StoredSession>>>,
    pending: Arc<RwLock<HashMap<String, PendingLogin>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty store with the default session lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    /// Create an empty store whose sessions live for `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Start an authorization round-trip, returning `(state, code_verifier)`.
    pub async fn begin_login(&self) -> (String, String) {
        let state = Uuid::new_v4().simple().to_string();
        let code_verifier = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );

        let mut pending = self.pending.write().await;
        pending.retain(|_, login| !login.is_expired());
        pending.insert(
            state.clone(),
            PendingLogin {
                code_verifier: code_verifier.clone(),
                started_at: Instant::now(),
            },
        );

        (state, code_verifier)
    }

    /// Consume the verifier for `state`. Each state can be used once.
    pub async fn take_login(&self, state: &str) -> Option<String> {
        let login = self.pending.write().await.remove(state)?;
        (!login.is_expired()).then_some(login.code_verifier)
    }

    /// Open a session for a user.
    pub async fn create(&self, user_id: i32, credential: RemoteCredential) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| stored.created_at.elapsed() < self.ttl);
        if sessions.len() < before {
            tracing::debug!(pruned = before - sessions.len(), "Pruned expired sessions");
        }
        sessions.insert(
            id,
            StoredSession {
                session: Session { user_id, credential },
                created_at: Instant::now(),
            },
        );
        tracing::debug!(user_id, "Session opened");
        id
    }

    /// Look up a live session.
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(&id)
            .filter(|stored| stored.created_at.elapsed() < self.ttl)
            .map(|stored| stored.session.clone())
    }

    /// Close a session. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Drop expired sessions and login requests.
    pub async fn cleanup(&self) {
        self.sessions
            .write()
            .await
            .retain(|_, stored| stored.created_at.elapsed() < self.ttl);
        self.pending
            .write()
            .await
            .retain(|_, login| !login.is_expired());
    }

    /// Number of stored sessions, expired ones included until pruned.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn credential() -> RemoteCredential {
        RemoteCredential::new("token".to_string(), None)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = SessionStore::new();
        let id = store.create(7, credential()).await;

        let session = store.get(id).await.unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.credential.access_token(), "token");

        assert!(store.remove(id).await);
        assert!(store.get(id).await.is_none());
        assert!(!store.remove(id).await);
    }

    #[tokio::test]
    async fn test_login_state_is_single_use() {
        let store = SessionStore::new();
        let (state, verifier) = store.begin_login().await;

        assert!(verifier.len() >= 43);
        assert_eq!(store.take_login(&state).await, Some(verifier));
        assert_eq!(store.take_login(&state).await, None);
        assert_eq!(store.take_login("unknown").await, None);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_pruned() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let first = store.create(1, credential()).await;
        assert!(store.get(first).await.is_none());

        // Opening another session drops the expired one.
        store.create(2, credential()).await;
        assert_eq!(store.session_count().await, 1);

        store.cleanup().await;
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_live_sessions_survive_cleanup() {
        let store = SessionStore::with_ttl(Duration::from_secs(3600));
        let a = store.create(1, credential()).await;
        let b = store.create(2, credential()).await;

        store.cleanup().await;

        assert_eq!(store.session_count().await, 2);
        assert_eq!(store.get(a).await.unwrap().user_id, 1);
        assert_eq!(store.get(b).await.unwrap().user_id, 2);
    }
}
