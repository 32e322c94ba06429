//! Wire-neutral request and response shapes.
//!
//! History is a list of [`Message`]s. Plain chat turns carry a string; tool
//! rounds carry [`ContentBlock`]s. `openai.rs` maps both onto chat-completions
//! JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ResponseValidationError;

// ─────────────────────────────────────────────────────────────────────────────
// Completion Request
// ─────────────────────────────────────────────────────────────────────────────

/// One model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Empty for the reasoning model and the memory prompts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            system: None,
            tools: Vec::new(),
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }

    /// An assistant turn carrying text and/or tool calls.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Blocks(blocks),
        }
    }

    /// A user turn carrying the results of the previous turn's tool calls.
    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Self {
            role: Role::User,
            content: Content::Blocks(results.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A plain string, or blocks once tools are involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self {
            Content::Text(s) => vec![ContentBlock::text(s.clone())],
            Content::Blocks(blocks) => blocks.clone(),
        }
    }

    /// Text blocks joined without separators; tool blocks are dropped.
    pub fn to_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content Blocks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Sent back in the user turn after the call.
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: content.into(),
        }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl From<ToolUseBlock> for ContentBlock {
    fn from(block: ToolUseBlock) -> Self {
        ContentBlock::ToolUse {
            id: block.id,
            name: block.name,
            input: block.input,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultBlock {
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: error.into(),
            is_error: true,
        }
    }
}

impl From<ToolResultBlock> for ContentBlock {
    fn from(block: ToolResultBlock) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: block.tool_use_id,
            content: block.content,
            is_error: block.is_error,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// A callable tool as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Response
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        content: Vec<ContentBlock>,
        stop_reason: StopReason,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            content,
            model: model.into(),
            stop_reason: Some(stop_reason),
            usage,
        }
    }

    pub fn tool_uses(&self) -> Vec<ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUseBlock {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }

    /// Every tool call needs a unique non-empty id, a name and an object
    /// input. All problems are reported together.
    pub fn validate(&self) -> Result<(), ResponseValidationError> {
        let mut errors = Vec::new();
        let mut seen_ids = HashSet::new();

        if self.id.trim().is_empty() {
            errors.push(ResponseValidationError::missing_field("id"));
        }

        for (index, block) in self.content.iter().enumerate() {
            if let ContentBlock::ToolUse { id, name, input } = block {
                if id.trim().is_empty() {
                    errors.push(ResponseValidationError::invalid_tool_use(
                        format!("#{index}"),
                        "empty id",
                    ));
                } else if !seen_ids.insert(id.as_str()) {
                    errors.push(ResponseValidationError::invalid_tool_use(
                        id.clone(),
                        "duplicate id",
                    ));
                }
                if name.trim().is_empty() {
                    errors.push(ResponseValidationError::invalid_tool_use(
                        id.clone(),
                        "empty tool name",
                    ));
                }
                if !input.is_object() {
                    errors.push(ResponseValidationError::invalid_tool_use(
                        id.clone(),
                        format!("input must be an object, got {}", json_type_name(input)),
                    ));
                }
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ResponseValidationError::Multiple(errors)),
        }
    }

    pub fn validated(self) -> Result<Self, ResponseValidationError> {
        self.validate()?;
        Ok(self)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(content: Vec<ContentBlock>) -> CompletionResponse {
        CompletionResponse::new("resp_1", "gpt-4o", content, StopReason::ToolUse, Usage::new(5, 7))
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("gpt-4o", vec![Message::user("hi")], 200)
            .with_system("You are Dhruv")
            .with_temperature(0.2);
        assert_eq!(request.system.as_deref(), Some("You are Dhruv"));
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.tools.is_empty());
    }

    #[test]
    fn test_content_to_text_skips_tool_blocks() {
        let content = Content::Blocks(vec![
            ContentBlock::text("Logging "),
            ContentBlock::tool_use("call_1", "log_water_intake", json!({"amount": 250})),
            ContentBlock::text("now."),
        ]);
        assert_eq!(content.to_text(), "Logging now.");
        assert_eq!(content.blocks().len(), 3);
    }

    #[test]
    fn test_tool_uses_and_text() {
        let resp = response(vec![
            ContentBlock::text("On it."),
            ContentBlock::tool_use("call_1", "log_water_intake", json!({"amount": 250})),
        ]);
        assert!(resp.has_tool_use());
        assert_eq!(resp.text(), "On it.");
        let uses = resp.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "log_water_intake");
    }

    #[test]
    fn test_tool_results_message() {
        let msg = Message::tool_results(vec![
            ToolResultBlock::success("call_1", "{\"success\":true}"),
            ToolResultBlock::error("call_2", "unknown tool"),
        ]);
        assert_eq!(msg.role, Role::User);
        let blocks = msg.content.blocks();
        assert!(matches!(
            &blocks[1],
            ContentBlock::ToolResult { is_error: true, .. }
        ));
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let resp = response(vec![ContentBlock::tool_use(
            "call_1",
            "search_user_memory",
            json!({}),
        )]);
        assert!(resp.validated().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_tool_calls() {
        let resp = response(vec![
            ContentBlock::tool_use("call_1", "", json!({})),
            ContentBlock::tool_use("call_1", "log_water_intake", json!("250ml")),
        ]);
        let err = resp.validate().unwrap_err();
        match err {
            ResponseValidationError::Multiple(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn test_content_block_serde_tagging() {
        let block = ContentBlock::tool_use("call_9", "log_calories_intake", json!({"calories": 95}));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["name"], "log_calories_intake");
    }
}
