//! Identity provider (OAuth 2.0 authorization code flow).
//!
//! Yields the provider identity, screen name, avatar and an access token for
//! the remote graph client. Login state itself is kept by the API layer.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use f4f_common::{AppError, AppResult, config::ProviderConfig};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::remote_graph::RemoteCredential;

/// Profile and credential obtained from a completed login.
#[derive(Debug, Clone)]
pub struct LoginProfile {
    /// Stable provider identifier.
    pub external_id: String,
    /// Provider screen name.
    pub display_name: String,
    /// Avatar URL, when the provider has one.
    pub avatar_url: Option<String>,
    /// Access token for remote graph calls.
    pub credential: RemoteCredential,
}

/// OAuth identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to in order to authorize this application.
    fn authorize_url(&self, state: &str, code_verifier: &str) -> String;

    /// Exchange an authorization code and fetch the user's profile.
    async fn complete_login(&self, code: &str, code_verifier: &str) -> AppResult<LoginProfile>;
}

/// Shared handle to an identity provider implementation.
pub type IdentityProviderClient = Arc<dyn IdentityProvider>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Identity provider speaking OAuth 2.0 with PKCE (`plain` challenge).
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    config: ProviderConfig,
    redirect_uri: String,
}

impl HttpIdentityProvider {
    /// Create a provider client; `redirect_uri` must match the registered callback.
    pub fn new(config: ProviderConfig, redirect_uri: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("f4f/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            redirect_uri,
        })
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse> {
        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Token exchange failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Provider refused token exchange");
            return Err(AppError::ExternalService(format!(
                "Token exchange failed: {status} - {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Malformed token response: {e}")))
    }

    async fn fetch_profile(&self, access_token: &str) -> AppResult<Value> {
        let url = Url::parse(&self.config.api_base_url)
            .and_then(|base| base.join("account/verify_credentials.json"))
            .map_err(|e| AppError::Config(format!("Invalid provider API URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(&[("skip_status", "true"), ("include_entities", "false")])
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Profile fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Provider refused profile fetch");
            return Err(AppError::ExternalService(format!(
                "Profile fetch failed: {status} - {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Malformed profile response: {e}")))
    }
}

/// Read the identity fields out of a provider profile document.
fn parse_profile(profile: &Value) -> AppResult<(String, String, Option<String>)> {
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| match profile.get(*name) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
    };

    let external_id = field(&["id_str", "id"])
        .ok_or_else(|| AppError::ExternalService("Profile has no id".to_string()))?;
    let display_name = field(&["screen_name", "username"])
        .ok_or_else(|| AppError::ExternalService("Profile has no screen name".to_string()))?;
    let avatar_url = field(&["profile_image_url_https", "profile_image_url"]);

    Ok((external_id, display_name, avatar_url))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn authorize_url(&self, state: &str, code_verifier: &str) -> String {
        match Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.config.scope.as_str()),
                ("state", state),
                ("code_challenge", code_verifier),
                ("code_challenge_method", "plain"),
            ],
        ) {
            Ok(url) => url.into(),
            Err(e) => {
                warn!(error = %e, "Invalid authorize URL in provider config");
                self.config.authorize_url.clone()
            }
        }
    }

    async fn complete_login(&self, code: &str, code_verifier: &str) -> AppResult<LoginProfile> {
        let token = self.exchange_code(code, code_verifier).await?;
        debug!("Exchanged authorization code for access token");

        let profile = self.fetch_profile(&token.access_token).await?;
        let (external_id, display_name, avatar_url) = parse_profile(&profile)?;
        info!(external_id = %external_id, screen_name = %display_name, "Fetched provider profile");

        let expires_at = token
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));

        Ok(LoginProfile {
            external_id,
            display_name,
            avatar_url,
            credential: RemoteCredential::new(token.access_token, expires_at),
        })
    }
}
