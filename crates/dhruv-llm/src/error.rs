//! LLM errors and their retry classification.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Details of a 429 from the provider.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub message: String,
    /// How long to wait before retrying, if the provider said.
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Build from an OpenAI-style error body and optional `Retry-After` header.
    ///
    /// Azure sends `Retry-After` in whole seconds; some proxies send fractional seconds.
    pub fn from_response(message: &str, retry_after_header: Option<&str>) -> Self {
        let retry_after = retry_after_header.and_then(|value| {
            let secs = value.trim().parse::<f64>().ok()?;
            (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
        });
        Self {
            message: message.to_string(),
            retry_after,
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {:.2}s)", retry_after.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Structural problems in a completion, found before the agent loop uses it.
#[derive(Debug, Clone, Error)]
pub enum ResponseValidationError {
    #[error("completion has no '{field}'")]
    MissingField { field: &'static str },

    #[error("tool call {id} is unusable: {reason}")]
    InvalidToolUse { id: String, reason: String },

    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ResponseValidationError>),
}

impl ResponseValidationError {
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    pub fn invalid_tool_use(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidToolUse {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<ResponseValidationError> for LlmError {
    fn from(err: ResponseValidationError) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider rejected the request (4xx other than auth and 429).
    #[error("provider error: {0}")]
    Backend(String),

    /// Transport failure or provider 5xx. Retried.
    #[error("network error: {0}")]
    Network(String),

    /// The backend cannot be built from its settings.
    #[error("backend misconfigured: {0}")]
    Config(String),

    #[error("cannot encode or decode payload: {0}")]
    Serialization(String),

    #[error("unusable completion: {0}")]
    InvalidResponse(String),

    /// HTTP 429. Retried after `retry_after` when the provider gives one.
    #[error("rate limited: {0}")]
    RateLimit(RateLimitInfo),

    /// HTTP 401/403.
    #[error("rejected credentials: {0}")]
    Auth(String),

    #[error("{0}")]
    Internal(String),
}

impl LlmError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(RateLimitInfo::new(message))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(info) => info.retry_after,
            _ => None,
        }
    }

    /// Network failures and rate limits are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("cannot connect: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::Network("timeout".to_string()).is_retryable());
        assert!(LlmError::rate_limit("slow down").is_retryable());
        assert!(!LlmError::Config("no key".to_string()).is_retryable());
        assert!(!LlmError::Auth("unauthorized".to_string()).is_retryable());
        assert!(!LlmError::Backend("bad request".to_string()).is_retryable());
    }

    #[test]
    fn test_rate_limit_from_response() {
        let info = RateLimitInfo::from_response("Requests to the deployment exceeded", Some("7"));
        assert_eq!(info.retry_after, Some(Duration::from_secs(7)));
        assert!(info.to_string().contains("retry after 7.00s"));

        let info = RateLimitInfo::from_response("slow down", Some("soon"));
        assert!(info.retry_after.is_none());
        assert_eq!(info.to_string(), "slow down");
    }

    #[test]
    fn test_retry_after_accessor() {
        let err = LlmError::RateLimit(RateLimitInfo::from_response("x", Some("1.5")));
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));
        assert!(LlmError::Network("x".into()).retry_after().is_none());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: LlmError = ResponseValidationError::missing_field("id").into();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert!(err.to_string().contains("'id'"));
    }
}
