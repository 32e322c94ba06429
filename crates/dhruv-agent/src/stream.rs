//! Streamed agent turns.
//!
//! A turn is a sequence of model steps. Each step's text is emitted in word
//! sized [`StreamChunk::Text`] pieces; each tool call the step asks for runs
//! to completion, in order, between a `ToolStart` and a `ToolEnd` chunk. The
//! turn ends with exactly one `Done` or `Error` chunk.

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use dhruv_llm::{CompletionRequest, Message, SharedBackend, ToolResultBlock};

use crate::agent::AgentConfig;
use crate::tool::{ToolContext, ToolRegistry, ToolResult};

// ─────────────────────────────────────────────────────────────────────────────
// Stream Chunk
// ─────────────────────────────────────────────────────────────────────────────

/// A chunk emitted during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// A piece of assistant text.
    Text { content: String },
    /// A tool call is about to run.
    ToolStart {
        id: String,
        name: String,
        input: Value,
    },
    /// A tool call finished; `result` is the tool's envelope.
    ToolEnd {
        id: String,
        success: bool,
        result: Value,
    },
    /// The turn finished after `steps` model calls.
    Done { steps: u32 },
    /// The turn was aborted.
    Error { message: String },
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn tool_start(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolStart {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_end(id: impl Into<String>, result: &ToolResult) -> Self {
        Self::ToolEnd {
            id: id.into(),
            success: result.success,
            result: result.to_value(),
        }
    }

    pub fn done(steps: u32) -> Self {
        Self::Done { steps }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The SSE event name for this chunk, matching its serde tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolEnd { .. } => "tool_end",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this chunk ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// A boxed stream of chunks.
pub type AgentStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Turn Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Split text into word pieces, each keeping its trailing space.
pub(crate) fn word_chunks(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(' ')
}

fn build_request(config: &AgentConfig, tools: &ToolRegistry, messages: &[Message]) -> CompletionRequest {
    let mut request = CompletionRequest::new(&config.model, messages.to_vec(), config.max_tokens);

    if let Some(ref prompt) = config.system_prompt {
        request = request.with_system(prompt);
    }
    if let Some(temp) = config.temperature {
        request = request.with_temperature(temp);
    }
    let tool_defs = tools.to_llm_definitions();
    if !tool_defs.is_empty() {
        request = request.with_tools(tool_defs);
    }

    request
}

/// Run one turn as a stream.
///
/// Stops after `config.max_steps` model calls even if the last step asked
/// for tools; those tools still run.
pub fn create_turn_stream(
    backend: SharedBackend,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    messages: Vec<Message>,
    ctx: ToolContext,
) -> AgentStream {
    Box::pin(async_stream::stream! {
        let mut messages = messages;
        let mut step = 0u32;

        loop {
            step += 1;

            let request = build_request(&config, &tools, &messages);
            debug!(
                user_id = %ctx.user_id,
                turn_id = %ctx.turn_id,
                step,
                messages = messages.len(),
                tools = tools.len(),
                model = %request.model,
                "Calling LLM"
            );

            let response = match backend.complete(request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(turn_id = %ctx.turn_id, step, error = %e, "LLM call failed");
                    yield StreamChunk::error(e.to_string());
                    return;
                }
            };

            let text = response.text();
            for piece in word_chunks(&text) {
                yield StreamChunk::text(piece);
            }

            if !response.has_tool_use() {
                info!(turn_id = %ctx.turn_id, steps = step, "Turn completed");
                yield StreamChunk::done(step);
                return;
            }

            let mut result_blocks = Vec::new();
            for tool_use in response.tool_uses() {
                yield StreamChunk::tool_start(&tool_use.id, &tool_use.name, tool_use.input.clone());

                let result = match tools.execute(&tool_use.name, tool_use.input.clone(), &ctx).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(turn_id = %ctx.turn_id, tool = %tool_use.name, error = %e, "Tool execution failed");
                        ToolResult::failure(e.to_string())
                    }
                };

                let content = result.to_llm_content();
                result_blocks.push(if result.success {
                    ToolResultBlock::success(&tool_use.id, content)
                } else {
                    ToolResultBlock::error(&tool_use.id, content)
                });

                yield StreamChunk::tool_end(&tool_use.id, &result);
            }

            messages.push(Message::assistant_blocks(response.content.clone()));
            messages.push(Message::tool_results(result_blocks));

            if step >= config.max_steps {
                info!(turn_id = %ctx.turn_id, steps = step, "Step limit reached");
                yield StreamChunk::done(step);
                return;
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcript
// ─────────────────────────────────────────────────────────────────────────────

/// Folds a turn's chunks into the message parts persisted for the assistant.
///
/// Adjacent text chunks merge into one `text` part; every tool call becomes a
/// `tool-invocation` part that moves from state `call` to `result`.
#[derive(Debug, Default, Clone)]
pub struct TurnTranscript {
    parts: Vec<Value>,
    finished: bool,
    failed: Option<String>,
}

impl TurnTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::Text { content } => {
                if let Some(last) = self.parts.last_mut()
                    && last["type"] == "text"
                {
                    let merged = format!("{}{}", last["text"].as_str().unwrap_or(""), content);
                    last["text"] = Value::String(merged);
                } else {
                    self.parts.push(json!({ "type": "text", "text": content }));
                }
            }
            StreamChunk::ToolStart { id, name, input } => {
                self.parts.push(json!({
                    "type": "tool-invocation",
                    "toolInvocation": {
                        "state": "call",
                        "toolCallId": id,
                        "toolName": name,
                        "args": input,
                    }
                }));
            }
            StreamChunk::ToolEnd { id, result, .. } => {
                let invocation = self
                    .parts
                    .iter_mut()
                    .rev()
                    .filter_map(|p| p.get_mut("toolInvocation"))
                    .find(|inv| inv["toolCallId"] == id.as_str());
                if let Some(invocation) = invocation {
                    invocation["state"] = json!("result");
                    invocation["result"] = result.clone();
                }
            }
            StreamChunk::Done { .. } => self.finished = true,
            StreamChunk::Error { message } => self.failed = Some(message.clone()),
        }
    }

    pub fn parts(&self) -> Value {
        Value::Array(self.parts.clone())
    }

    /// The turn reached `Done`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn error(&self) -> Option<&str> {
        self.failed.as_deref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::MockTool;
    use dhruv_llm::{CompletionResponse, ContentBlock, MockBackend, StopReason, Usage, text_response};
    use futures::StreamExt;
    use uuid::Uuid;

    fn tool_call(id: &str, name: &str, input: Value) -> CompletionResponse {
        CompletionResponse::new(
            "msg",
            "mock-model",
            vec![ContentBlock::tool_use(id, name, input)],
            StopReason::ToolUse,
            Usage::new(10, 5),
        )
    }

    fn config() -> AgentConfig {
        AgentConfig::new("test-model").with_system_prompt("You are Dhruv.")
    }

    async fn collect(stream: AgentStream) -> Vec<StreamChunk> {
        stream.collect().await
    }

    #[test]
    fn test_word_chunks_preserve_text() {
        let text = "Great job  on the water today!";
        let pieces: Vec<&str> = word_chunks(text).collect();
        assert_eq!(pieces[0], "Great ");
        assert_eq!(pieces.concat(), text);
        assert_eq!(word_chunks("").count(), 0);
    }

    #[test]
    fn test_chunk_serialization() {
        let chunk = StreamChunk::text("hello");
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json, json!({"type": "text", "content": "hello"}));
        assert_eq!(chunk.event_name(), "text");

        let done = StreamChunk::done(2);
        assert_eq!(serde_json::to_value(&done).unwrap()["type"], done.event_name());
        assert!(done.is_terminal());
    }

    #[tokio::test]
    async fn test_text_only_turn() {
        let backend = Arc::new(MockBackend::with_text("Namaste bhai"));
        let stream = create_turn_stream(
            backend.clone(),
            Arc::new(ToolRegistry::new()),
            config(),
            vec![Message::user("hi")],
            ToolContext::new(Uuid::new_v4()),
        );

        let chunks = collect(stream).await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::text("Namaste "),
                StreamChunk::text("bhai"),
                StreamChunk::done(1)
            ]
        );

        let request = &backend.requests()[0];
        assert_eq!(request.system.as_deref(), Some("You are Dhruv."));
        assert!(request.tools.is_empty());
    }

    #[tokio::test]
    async fn test_tool_turn_runs_tools_in_order() {
        let backend = Arc::new(MockBackend::new(vec![
            CompletionResponse::new(
                "msg",
                "mock-model",
                vec![
                    ContentBlock::tool_use("call_1", "log_water_intake", json!({"amount": 250})),
                    ContentBlock::tool_use("call_2", "log_water_intake", json!({"amount": 300})),
                ],
                StopReason::ToolUse,
                Usage::new(10, 5),
            ),
            text_response("Logged both"),
        ]));
        let tool = Arc::new(MockTool::new("log_water_intake"));
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());

        let chunks = collect(create_turn_stream(
            backend.clone(),
            Arc::new(registry),
            config(),
            vec![Message::user("I drank 250ml and 300ml")],
            ToolContext::new(Uuid::new_v4()),
        ))
        .await;

        let names: Vec<&str> = chunks.iter().map(|c| c.event_name()).collect();
        assert_eq!(
            names,
            vec!["tool_start", "tool_end", "tool_start", "tool_end", "text", "text", "done"]
        );
        assert_eq!(tool.calls()[0]["amount"], 250);
        assert_eq!(tool.calls()[1]["amount"], 300);
        assert_eq!(chunks.last(), Some(&StreamChunk::done(2)));

        // Second request carries the assistant tool calls and their results.
        let second = &backend.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_failed_result() {
        let backend = Arc::new(MockBackend::new(vec![
            tool_call("call_1", "log_steps", json!({})),
            text_response("Sorry"),
        ]));

        let chunks = collect(create_turn_stream(
            backend,
            Arc::new(ToolRegistry::new()),
            config(),
            vec![Message::user("log my steps")],
            ToolContext::new(Uuid::new_v4()),
        ))
        .await;

        match &chunks[1] {
            StreamChunk::ToolEnd { success, result, .. } => {
                assert!(!success);
                assert_eq!(result["error"], "Tool not found: log_steps");
            }
            other => panic!("unexpected chunk {other:?}"),
        }
        assert_eq!(chunks.last(), Some(&StreamChunk::done(2)));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let responses = (0..10)
            .map(|i| tool_call(&format!("call_{i}"), "search_user_memory", json!({})))
            .collect();
        let backend = Arc::new(MockBackend::new(responses));
        let mut registry = ToolRegistry::new();
        registry.register(MockTool::new("search_user_memory"));

        let chunks = collect(create_turn_stream(
            backend.clone(),
            Arc::new(registry),
            config().with_max_steps(3),
            vec![Message::user("what do you know about me")],
            ToolContext::new(Uuid::new_v4()),
        ))
        .await;

        assert_eq!(backend.request_count(), 3);
        assert_eq!(chunks.last(), Some(&StreamChunk::done(3)));
    }

    #[tokio::test]
    async fn test_llm_failure_ends_with_error() {
        let backend = Arc::new(MockBackend::failing("provider down"));
        let chunks = collect(create_turn_stream(
            backend,
            Arc::new(ToolRegistry::new()),
            config(),
            vec![Message::user("hi")],
            ToolContext::new(Uuid::new_v4()),
        ))
        .await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], StreamChunk::Error { message } if message.contains("provider down")));
    }

    #[test]
    fn test_transcript_parts() {
        let mut transcript = TurnTranscript::new();
        transcript.record(&StreamChunk::tool_start("call_1", "log_water_intake", json!({"amount": 250})));
        transcript.record(&StreamChunk::tool_end(
            "call_1",
            &ToolResult::ok("Successfully logged 250ml of water intake", json!({})),
        ));
        transcript.record(&StreamChunk::text("Nice "));
        transcript.record(&StreamChunk::text("work!"));
        transcript.record(&StreamChunk::done(2));

        assert!(transcript.is_finished());

        let parts = transcript.parts();
        assert_eq!(parts.as_array().unwrap().len(), 2);
        let invocation = &parts[0]["toolInvocation"];
        assert_eq!(invocation["state"], "result");
        assert_eq!(invocation["toolName"], "log_water_intake");
        assert_eq!(invocation["args"]["amount"], 250);
        assert_eq!(invocation["result"]["success"], true);
        assert_eq!(parts[1], json!({"type": "text", "text": "Nice work!"}));
    }

    #[test]
    fn test_transcript_error() {
        let mut transcript = TurnTranscript::new();
        transcript.record(&StreamChunk::error("provider down"));
        assert!(!transcript.is_finished());
        assert_eq!(transcript.error(), Some("provider down"));
    }
}
