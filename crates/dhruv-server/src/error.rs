//! Error types for the server.
//!
//! Chat routes answer failures with a plain-text body; the `/api/user` routes
//! use the `{ success: false, error }` envelope via [`JsonFailure`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub const ENTITLEMENT_EXCEEDED: &str =
    "You have exceeded your maximum number of messages for the day! Please try again later.";
const INTERNAL_MESSAGE: &str = "An error occurred while processing your request!";

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    /// Daily message entitlement used up.
    #[error("{ENTITLEMENT_EXCEEDED}")]
    RateLimitExceeded,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Agent error: {0}")]
    Agent(#[from] dhruv_agent::AgentError),

    #[error("Storage error: {0}")]
    Storage(#[from] dhruv_store::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Internal(_)
            | ServerError::Agent(_)
            | ServerError::Storage(_)
            | ServerError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The body sent to the client. Server-side failures are not detailed.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, error = %message, "Client error");
        }

        (status, self.public_message()).into_response()
    }
}

/// A failure answered with `{ "success": false, "error": ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonFailure {
    pub status: StatusCode,
    pub error: String,
}

impl JsonFailure {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
        }
    }
}

impl From<dhruv_store::StoreError> for JsonFailure {
    fn from(e: dhruv_store::StoreError) -> Self {
        Self::internal(e.to_string())
    }
}

impl IntoResponse for JsonFailure {
    fn into_response(self) -> Response {
        tracing::warn!(status = %self.status, error = %self.error, "Request failed");
        let body = json!({ "success": false, "error": self.error });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServerError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ServerError::RateLimitExceeded.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ServerError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = ServerError::Internal("database is locked".into());
        assert_eq!(err.public_message(), INTERNAL_MESSAGE);

        let err = ServerError::bad_request("Invalid request body");
        assert_eq!(err.public_message(), "Invalid request body");
        assert_eq!(ServerError::RateLimitExceeded.public_message(), ENTITLEMENT_EXCEEDED);
    }

    #[tokio::test]
    async fn test_json_failure_body() {
        let response = JsonFailure::bad_request("User ID is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"success": false, "error": "User ID is required"}));
    }
}
