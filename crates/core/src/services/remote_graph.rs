//! Remote graph client.
//!
//! Mirrors follow/unfollow actions onto the identity provider's own social
//! graph, authenticated with the acting user's credential.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use f4f_common::{AppError, AppResult};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Provider access token held by a logged-in session.
///
/// Passed explicitly to every remote call; never stored in ambient state.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredential {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl RemoteCredential {
    /// Create a credential from an access token and optional expiry.
    #[must_use]
    pub const fn new(access_token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    /// The bearer token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Whether the token can still be presented to the provider.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() && self.expires_at.is_none_or(|at| at > Utc::now())
    }
}

impl fmt::Debug for RemoteCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Failure of a remote relationship call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteGraphError {
    /// The provider answered with a non-success status.
    #[error("provider rejected the request: {status} - {detail}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: u16,
        /// Response body returned by the provider.
        detail: String,
    },
    /// No usable response arrived (connect failure, timeout, bad URL).
    #[error("provider unreachable: {0}")]
    Transport(String),
}

impl From<RemoteGraphError> for AppError {
    fn from(err: RemoteGraphError) -> Self {
        match err {
            RemoteGraphError::Rejected { status, detail } => Self::RemoteSync { status, detail },
            RemoteGraphError::Transport(detail) => Self::RemoteSync {
                status: 502,
                detail,
            },
        }
    }
}

/// Relationship calls against the provider's social graph.
#[async_trait]
pub trait RemoteGraph: Send + Sync {
    /// Follow `screen_name` on behalf of the credential's owner.
    async fn create_relationship(
        &self,
        credential: &RemoteCredential,
        screen_name: &str,
    ) -> Result<(), RemoteGraphError>;

    /// Unfollow `screen_name` on behalf of the credential's owner.
    async fn destroy_relationship(
        &self,
        credential: &RemoteCredential,
        screen_name: &str,
    ) -> Result<(), RemoteGraphError>;
}

/// Shared handle to a remote graph implementation.
pub type RemoteGraphClient = Arc<dyn RemoteGraph>;

/// Remote graph client speaking the provider's REST API.
#[derive(Clone)]
pub struct HttpRemoteGraph {
    client: Client,
    api_base_url: Url,
}

impl HttpRemoteGraph {
    /// Create a client for the API rooted at `api_base_url`.
    pub fn new(api_base_url: &str) -> AppResult<Self> {
        let api_base_url = Url::parse(api_base_url)
            .map_err(|e| AppError::Config(format!("Invalid provider API URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("f4f/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url,
        })
    }

    async fn post(
        &self,
        credential: &RemoteCredential,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<(), RemoteGraphError> {
        let url = self
            .api_base_url
            .join(path)
            .map_err(|e| RemoteGraphError::Transport(e.to_string()))?;

        debug!(path = %path, "Calling provider relationship endpoint");

        let response = self
            .client
            .post(url)
            .bearer_auth(credential.access_token())
            .query(params)
            .send()
            .await
            .map_err(|e| RemoteGraphError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(path = %path, status = %status, "Provider accepted relationship change");
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            warn!(path = %path, status = %status, body = %detail, "Provider rejected relationship change");
            Err(RemoteGraphError::Rejected {
                status: status.as_u16(),
                detail,
            })
        }
    }
}

#[async_trait]
impl RemoteGraph for HttpRemoteGraph {
    async fn create_relationship(
        &self,
        credential: &RemoteCredential,
        screen_name: &str,
    ) -> Result<(), RemoteGraphError> {
        self.post(
            credential,
            "friendships/create.json",
            &[("screen_name", screen_name), ("follow", "true")],
        )
        .await
    }

    async fn destroy_relationship(
        &self,
        credential: &RemoteCredential,
        screen_name: &str,
    ) -> Result<(), RemoteGraphError> {
        self.post(
            credential,
            "friendships/destroy.json",
            &[("screen_name", screen_name)],
        )
        .await
    }
}
