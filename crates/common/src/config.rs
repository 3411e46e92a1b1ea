//! Application configuration.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Identity provider configuration.
    pub provider: ProviderConfig,
    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this backend (used to build the OAuth callback URL).
    pub url: String,
    /// URL of the frontend; the only origin allowed by CORS.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Identity provider (OAuth + social graph API) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Authorization endpoint the browser is redirected to.
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    /// Token endpoint used to exchange the authorization code.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Base URL of the provider REST API (with trailing slash).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Space-separated OAuth scopes.
    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Whether cookies carry the `Secure` attribute.
    #[serde(default)]
    pub secure: bool,
    /// Lifetime of a login session, in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure: false,
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl ServerConfig {
    /// URL the provider redirects back to after authorization.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.url.trim_end_matches('/'))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_authorize_url() -> String {
    "https://twitter.com/i/oauth2/authorize".to_string()
}

fn default_token_url() -> String {
    "https://api.twitter.com/2/oauth2/token".to_string()
}

fn default_api_base_url() -> String {
    "https://api.twitter.com/1.1/".to_string()
}

fn default_scope() -> String {
    "users.read follows.read follows.write offline.access".to_string()
}

fn default_cookie_name() -> String {
    "f4f_session".to_string()
}

const fn default_session_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, exported into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `F4F_ENV`)
    /// 4. Environment variables with `F4F__` prefix, e.g. `F4F__DATABASE__URL`
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("F4F_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("F4F")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
