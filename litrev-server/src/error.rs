//! Error types for litrev-server
//!
//! Every handler returns [`ApiResult`]. Failures are rendered as a tagged
//! result object:
//!
//! ```json
//! {"success": false, "error": {"code": "CONFLICT", "message": "..."}}
//! ```
//!
//! Successful actions use [`ok`] to produce `{"success": true, "data": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Member lacks the required permission (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found, or not visible to the caller (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict with current state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Lifecycle transition not allowed (409)
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A job already owns the batch (409)
    #[error("Job already running: {0}")]
    JobAlreadyRunning(String),

    /// Change would leave the project without a member manager (409)
    #[error("Last manager: {0}")]
    LastManager(String),

    /// Rate limit exceeded (429)
    #[error("Too many requests: {0}")]
    RateLimited(String),

    /// Sign-up requests are switched off (503)
    #[error("Sign-up disabled: {0}")]
    SignupDisabled(String),

    /// No LLM client configured (503)
    #[error("AI unavailable: {0}")]
    AiUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// litrev-common error
    #[error("Common error: {0}")]
    Common(#[from] litrev_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(litrev_common::Error::Database(err))
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::InvalidTransition(_) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            ApiError::JobAlreadyRunning(_) => (StatusCode::CONFLICT, "JOB_ALREADY_RUNNING"),
            ApiError::LastManager(_) => (StatusCode::CONFLICT, "LAST_MANAGER"),
            ApiError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            ApiError::SignupDisabled(_) => (StatusCode::SERVICE_UNAVAILABLE, "SIGNUP_DISABLED"),
            ApiError::AiUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "AI_UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Common(err) => match err {
                litrev_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                litrev_common::Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                _ if err.is_unique_violation() => (StatusCode::CONFLICT, "CONFLICT"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InvalidTransition(msg)
            | ApiError::JobAlreadyRunning(msg)
            | ApiError::LastManager(msg)
            | ApiError::RateLimited(msg)
            | ApiError::SignupDisabled(msg)
            | ApiError::AiUnavailable(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Common(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.message();

        if status.is_server_error() {
            error!(code, error = %message, "Request failed");
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Tagged success envelope
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub success: bool,
    pub data: T,
}

/// Wrap a successful action result
pub fn ok<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        data,
    })
}
