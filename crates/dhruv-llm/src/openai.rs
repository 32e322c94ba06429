//! OpenAI-compatible chat-completions backend.
//!
//! One implementation serves OpenAI, Azure OpenAI deployments, Ollama and any
//! other service speaking the same protocol. Providers differ only in the
//! endpoint URL and the authentication header.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LlmBackend, with_retry};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::types::{
    CompletionRequest, CompletionResponse, ContentBlock, Role, StopReason, Usage,
};

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434/v1";
const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How the API key is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>` (Azure)
    ApiKeyHeader,
}

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key (optional for local services like Ollama).
    pub api_key: Option<String>,
    /// Base URL. For Azure, the resource endpoint (`https://<name>.openai.azure.com`).
    pub base_url: String,
    /// Model name, or the deployment name for Azure.
    pub model: Option<String>,
    /// Azure `api-version`; `None` for plain OpenAI-style endpoints.
    pub api_version: Option<String>,
    pub auth: AuthStyle,
    pub timeout: Duration,
    /// Maximum retries for transient errors.
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Name for this backend instance, used in logs.
    pub name: String,
}

impl OpenAiConfig {
    fn base(name: &str, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: None,
            api_version: None,
            auth: AuthStyle::Bearer,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            name: name.to_string(),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::base("openai", DEFAULT_OPENAI_BASE, Some(api_key.into()))
    }

    /// An Azure OpenAI deployment.
    pub fn azure(
        endpoint: impl AsRef<str>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let mut config = Self::base("azure", endpoint.as_ref(), Some(api_key.into()));
        config.model = Some(deployment.into());
        config.api_version = Some(DEFAULT_AZURE_API_VERSION.to_string());
        config.auth = AuthStyle::ApiKeyHeader;
        config
    }

    /// Local Ollama with its OpenAI-compatible endpoint.
    pub fn ollama() -> Self {
        let mut config = Self::base("ollama", DEFAULT_OLLAMA_BASE, None);
        config.timeout = Duration::from_secs(600);
        config
    }

    /// Any other OpenAI-compatible endpoint.
    pub fn custom(base_url: impl AsRef<str>, api_key: Option<String>) -> Self {
        Self::base("custom", base_url.as_ref(), api_key)
    }

    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────────────────

pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.auth == AuthStyle::ApiKeyHeader && config.model.is_none() {
            return Err(LlmError::Config(
                "Azure backend requires a deployment name".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Wrap into a shared trait object.
    pub fn shared(config: OpenAiConfig) -> Result<Arc<dyn LlmBackend>> {
        Ok(Arc::new(Self::new(config)?))
    }

    /// The chat-completions endpoint.
    ///
    /// Azure routes by deployment: `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=..`.
    fn completions_url(&self) -> String {
        match (self.config.auth, &self.config.model) {
            (AuthStyle::ApiKeyHeader, Some(deployment)) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.base_url,
                deployment,
                self.config
                    .api_version
                    .as_deref()
                    .unwrap_or(DEFAULT_AZURE_API_VERSION)
            ),
            _ => format!("{}/chat/completions", self.config.base_url),
        }
    }

    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");
        match (&self.config.api_key, self.config.auth) {
            (Some(key), AuthStyle::Bearer) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", key))
            }
            (Some(key), AuthStyle::ApiKeyHeader) => builder.header("api-key", key),
            (None, _) => builder,
        }
    }

    /// Translate to the chat-completions wire format.
    fn to_openai_request(&self, request: &CompletionRequest) -> OpenAiChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = &request.system {
            messages.push(OpenAiMessage::text("system", system.clone()));
        }

        for m in &request.messages {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            let mut tool_results = Vec::new();

            for block in m.content.blocks() {
                match block {
                    ContentBlock::Text { text: t } => text.push_str(&t),
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(OpenAiToolCall {
                        id,
                        call_type: "function".to_string(),
                        function: OpenAiFunctionCall {
                            name,
                            arguments: input.to_string(),
                        },
                    }),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => tool_results.push((tool_use_id, content)),
                }
            }

            if !tool_results.is_empty() {
                // Each result becomes its own "tool" role message.
                for (id, content) in tool_results {
                    messages.push(OpenAiMessage {
                        role: "tool".to_string(),
                        content: Some(content),
                        tool_calls: None,
                        tool_call_id: Some(id),
                    });
                }
            } else if !tool_calls.is_empty() {
                messages.push(OpenAiMessage {
                    role: "assistant".to_string(),
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: Some(tool_calls),
                    tool_call_id: None,
                });
            } else {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                messages.push(OpenAiMessage::text(role, text));
            }
        }

        let tools = (!request.tools.is_empty()).then(|| {
            request
                .tools
                .iter()
                .map(|t| OpenAiTool {
                    tool_type: "function".to_string(),
                    function: OpenAiFunction {
                        name: t.name.clone(),
                        description: Some(t.description.clone()),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect()
        });

        let model = if request.model.is_empty() {
            self.config.model.clone().unwrap_or_default()
        } else {
            request.model.clone()
        };

        OpenAiChatRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            tools,
        }
    }

    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }
        let body = response.text().await?;
        let parsed: OpenAiChatResponse = serde_json::from_str(&body)?;
        Ok(CompletionResponse::from(parsed).validated()?)
    }

    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OpenAiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => LlmError::Auth(message),
            429 => LlmError::RateLimit(RateLimitInfo::from_response(
                &message,
                retry_after.as_deref(),
            )),
            500..=599 => LlmError::Network(format!("Server error ({}): {}", status, message)),
            _ => LlmError::Backend(message),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let openai_request = self.to_openai_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %openai_request.model,
            messages = openai_request.messages.len(),
            tools = openai_request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Sending chat completion request"
        );

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            &self.config.name,
            || async {
                let response = self
                    .add_headers(self.client.post(self.completions_url()))
                    .json(&openai_request)
                    .send()
                    .await?;
                Self::handle_response(response).await
            },
        )
        .await
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn default_model(&self) -> Option<&str> {
        self.config.model.as_deref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: serde_json::Value,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    id: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    model: String,
    usage: Option<OpenAiUsage>,
}

impl From<OpenAiChatResponse> for CompletionResponse {
    fn from(resp: OpenAiChatResponse) -> Self {
        let mut content = Vec::new();
        let mut stop_reason = StopReason::EndTurn;

        if let Some(choice) = resp.choices.into_iter().next() {
            if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
                content.push(ContentBlock::text(text));
            }
            for tc in choice.message.tool_calls.unwrap_or_default() {
                // Malformed arguments become an empty object; tool validation reports it.
                let input = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| serde_json::json!({}));
                content.push(ContentBlock::tool_use(tc.id, tc.function.name, input));
            }
            stop_reason = match choice.finish_reason.as_deref() {
                Some("tool_calls") => StopReason::ToolUse,
                Some("length") => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            };
        }

        let usage = resp
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        CompletionResponse {
            id: resp.id,
            content,
            model: resp.model,
            stop_reason: Some(stop_reason),
            usage,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ToolDefinition, ToolResultBlock};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_body(content: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"message": content, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })
    }

    #[test]
    fn test_completions_urls() {
        let openai = OpenAiBackend::new(OpenAiConfig::openai("k")).unwrap();
        assert_eq!(
            openai.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        let azure = OpenAiBackend::new(
            OpenAiConfig::azure("https://coach.openai.azure.com/", "gpt-4o", "k")
                .with_api_version("2024-06-01"),
        )
        .unwrap();
        assert_eq!(
            azure.completions_url(),
            "https://coach.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );

        let ollama = OpenAiBackend::new(OpenAiConfig::ollama()).unwrap();
        assert_eq!(
            ollama.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_azure_requires_deployment() {
        let mut config = OpenAiConfig::azure("https://x.openai.azure.com", "d", "k");
        config.model = None;
        assert!(matches!(
            OpenAiBackend::new(config),
            Err(LlmError::Config(_))
        ));
    }

    #[test]
    fn test_to_openai_request_with_tool_round() {
        let backend = OpenAiBackend::new(OpenAiConfig::openai("k")).unwrap();
        let request = CompletionRequest::new(
            "gpt-4o",
            vec![
                Message::user("I drank 250ml"),
                Message::assistant_blocks(vec![ContentBlock::tool_use(
                    "call_1",
                    "log_water_intake",
                    json!({"amount": 250}),
                )]),
                Message::tool_results(vec![ToolResultBlock::success(
                    "call_1",
                    "{\"success\":true}",
                )]),
            ],
            512,
        )
        .with_system("You are Dhruv")
        .with_tools(vec![ToolDefinition::new(
            "log_water_intake",
            "Log and save the water intake by User",
            json!({"type": "object"}),
        )]);

        let wire = serde_json::to_value(backend.to_openai_request(&request)).unwrap();
        let messages = wire["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["role"], "assistant");
        assert!(messages[2].get("content").is_none());
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "log_water_intake");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(wire["tools"][0]["type"], "function");
        assert_eq!(wire["max_tokens"], 512);
    }

    #[test]
    fn test_response_conversion_with_tool_calls() {
        let resp: OpenAiChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-2",
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_7",
                        "type": "function",
                        "function": {"name": "log_calories_intake", "arguments": "{\"calories\":95}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let converted: CompletionResponse = resp.into();
        assert_eq!(converted.stop_reason, Some(StopReason::ToolUse));
        let uses = converted.tool_uses();
        assert_eq!(uses[0].input["calories"], 95);
        assert_eq!(converted.usage.total(), 0);
    }

    #[tokio::test]
    async fn test_complete_against_openai_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body(json!({"content": "Namaste!"}))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(OpenAiConfig::custom(server.uri(), Some("sk-test".into()))).unwrap();
        let response = backend
            .complete(CompletionRequest::new("gpt-4o", vec![Message::user("hi")], 64))
            .await
            .unwrap();
        assert_eq!(response.text(), "Namaste!");
        assert_eq!(response.usage, Usage::new(12, 3));
    }

    #[tokio::test]
    async fn test_complete_against_azure_deployment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/coach-gpt4o/chat/completions"))
            .and(query_param("api-version", "2024-10-21"))
            .and(header("api-key", "azure-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body(json!({"content": "YES"}))),
            )
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(OpenAiConfig::azure(server.uri(), "coach-gpt4o", "azure-key"))
                .unwrap();
        let response = backend
            .complete(CompletionRequest::new("", vec![Message::user("hi")], 10))
            .await
            .unwrap();
        assert_eq!(response.text(), "YES");
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Incorrect API key"}})),
            )
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(OpenAiConfig::custom(server.uri(), Some("bad".into()))).unwrap();
        let err = backend
            .complete(CompletionRequest::new("m", vec![Message::user("hi")], 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Auth(ref m) if m == "Incorrect API key"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "0")
                    .set_body_json(json!({"error": {"message": "Too many requests"}})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(
            OpenAiConfig::custom(server.uri(), None)
                .with_max_retries(2)
                .with_retry_backoff(Duration::from_millis(1)),
        )
        .unwrap();
        let err = backend
            .complete(CompletionRequest::new("m", vec![Message::user("hi")], 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimit(_)));
    }

    #[tokio::test]
    async fn test_duplicate_tool_call_ids_rejected() {
        let server = MockServer::start().await;
        let call = json!({
            "id": "call_1",
            "type": "function",
            "function": {"name": "log_water_intake", "arguments": "{\"amount\": 250}"}
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-3",
                "model": "gpt-4o",
                "choices": [{
                    "message": {"role": "assistant", "content": null, "tool_calls": [call.clone(), call]},
                    "finish_reason": "tool_calls"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(OpenAiConfig::custom(server.uri(), None)).unwrap();
        let err = backend
            .complete(CompletionRequest::new("m", vec![Message::user("hi")], 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(ref m) if m.contains("duplicate id")));
    }
}
