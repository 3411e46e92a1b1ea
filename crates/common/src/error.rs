//! Error types for f4f.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Target user not found: {0}")]
    TargetNotFound(String),

    #[error("Unauthorized. Please log in.")]
    Unauthorized,

    #[error("Authentication token for the provider API is missing. Please log out and log back in.")]
    RemoteAuthMissing,

    #[error("Cannot follow/unfollow yourself")]
    SelfFollow,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    #[error("Failed to update follow status on the provider: {detail}")]
    RemoteSync {
        /// Status reported by the provider (502 when no response arrived).
        status: u16,
        /// Body or transport message returned by the provider.
        detail: String,
    },

    #[error("Provider and local follow state diverged: {0}")]
    PartialSync(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) | Self::UserNotFound(_) | Self::TargetNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Unauthorized | Self::RemoteAuthMissing => StatusCode::UNAUTHORIZED,
            Self::SelfFollow | Self::BadRequest(_) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::RemoteSync { .. } => StatusCode::BAD_GATEWAY,
            Self::PartialSync(_)
            | Self::Database(_)
            | Self::Config(_)
            | Self::ExternalService(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RemoteAuthMissing => "REMOTE_AUTH_MISSING",
            Self::SelfFollow => "SELF_FOLLOW",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::RemoteSync { .. } => "REMOTE_SYNC_ERROR",
            Self::PartialSync(_) => "PARTIAL_SYNC_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Returns whether this error leaves provider and local state out of step.
    #[must_use]
    pub const fn needs_reconciliation(&self) -> bool {
        matches!(self, Self::PartialSync(_))
    }

    /// Builds the JSON body returned to API clients.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let mut error = Map::new();
        error.insert("code".to_string(), json!(self.error_code()));
        error.insert("message".to_string(), json!(self.to_string()));

        if let Self::RemoteSync { status, detail } = self {
            error.insert("remoteStatus".to_string(), json!(status));
            error.insert("details".to_string(), json!(detail));
        }

        json!({ "error": error })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.needs_reconciliation() {
            tracing::error!(error = %self, code = code, "Follow state needs reconciliation");
        } else if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        (status, Json(self.to_body())).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
