//! LLM Backend trait and implementations.
//!
//! Defines the seam between the agent and model providers, the shared retry
//! helper, and [`MockBackend`] for deterministic tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, StopReason, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Only retryable errors (network, rate limit) are retried. A rate limit that
/// carries `retry_after` waits that long instead of the current backoff.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        if !err.is_retryable() || attempt >= max_retries {
            return Err(err);
        }
        attempt += 1;

        let wait = err.retry_after().unwrap_or(backoff);
        tracing::warn!(
            backend = backend_name,
            attempt,
            max_retries,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "Request failed, retrying"
        );
        tokio::time::sleep(wait).await;
        backoff *= 2;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A chat-completions provider.
///
/// Tool calling is native: tools travel in `request.tools` and come back as
/// `ContentBlock::ToolUse` blocks.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Name for logs.
    fn name(&self) -> &str;

    /// Model used when the request leaves it blank.
    fn default_model(&self) -> Option<&str> {
        None
    }
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A mock backend for tests.
///
/// Returns queued responses in order and records every request. Once the
/// queue is empty each call fails, so a test that triggers an unexpected
/// model call sees an error rather than a hang. [`MockBackend::failing`]
/// fails every call from the start.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    responses: Mutex<VecDeque<Result<CompletionResponse>>>,
    request_log: Mutex<Vec<CompletionRequest>>,
    always_fail: Option<String>,
}

impl MockBackend {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            request_log: Mutex::new(Vec::new()),
            always_fail: None,
        }
    }

    /// One plain-text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_texts([text])
    }

    /// One plain-text response per item, returned in order.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(text_response).collect())
    }

    /// A backend whose every call fails with a backend error.
    pub fn failing(message: impl Into<String>) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.always_fail = Some(message.into());
        mock
    }

    /// Queue an error to be returned at this position.
    pub fn push_error(&self, error: LlmError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn push_response(&self, response: CompletionResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }
}

/// A final text-only response, as a provider returns when no tool is called.
pub fn text_response(text: impl Into<String>) -> CompletionResponse {
    CompletionResponse::new(
        "mock_msg",
        "mock-model",
        vec![ContentBlock::text(text)],
        StopReason::EndTurn,
        Usage::new(10, 20),
    )
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().push(request);

        if let Some(message) = &self.always_fail {
            return Err(LlmError::Backend(message.clone()));
        }
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            ))
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
