//! Tool framework for the coaching agent.
//!
//! Every tool implements [`Tool`] and is looked up by name through a
//! [`ToolRegistry`]. Tools never surface their own failures as errors: a
//! rejected parameter or a failed write becomes a [`ToolResult`] with
//! `success: false`, which the model sees and can react to.
//!
//! # Example
//!
//! ```rust,ignore
//! use dhruv_agent::{Tool, ToolContext, ToolResult, ToolRegistry};
//!
//! struct StepsTool;
//!
//! #[async_trait]
//! impl Tool for StepsTool {
//!     fn name(&self) -> &str { "log_steps" }
//!     fn description(&self) -> &str { "Log a step count" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
//!         Ok(ToolResult::ok("Logged", json!({})))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(StepsTool);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dhruv_store::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AgentError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Why a tool call's arguments were rejected.
///
/// Domain rules reuse the store's [`ValidationError`] so the model reads the
/// same message whether the tool or the store caught the problem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterValidationError {
    /// A domain rule failed ("Calories must be a positive number").
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// A parameter has the wrong JSON type.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: String,
    },
}

impl ParameterValidationError {
    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: &serde_json::Value,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: json_type_name(actual).to_string(),
        }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::Tool(err.to_string())
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

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helpers for pulling typed arguments out of a tool call's JSON input.
///
/// `null` is treated the same as an absent key.
pub trait ParamExt {
    /// A string argument; non-strings read as absent.
    fn optional_str(&self, name: &str) -> Option<&str>;

    /// A number that must be finite and greater than zero. A missing or
    /// non-numeric value fails with the same message as a negative one.
    fn positive_f64(&self, name: &str, label: &'static str) -> ParamResult<f64>;

    /// Like [`ParamExt::positive_f64`] but absent is allowed.
    fn optional_positive_f64(&self, name: &str, label: &'static str) -> ParamResult<Option<f64>>;

    /// A string parsed with `FromStr`, reporting `invalid` on any bad input.
    fn optional_parsed<T: FromStr>(&self, name: &str, invalid: ValidationError)
    -> ParamResult<Option<T>>;

    /// An RFC 3339 timestamp.
    fn optional_timestamp(&self, name: &str) -> ParamResult<Option<DateTime<Utc>>>;
}

impl ParamExt for serde_json::Value {
    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    fn positive_f64(&self, name: &str, label: &'static str) -> ParamResult<f64> {
        self.optional_positive_f64(name, label)?
            .ok_or(ValidationError::NotPositive(label).into())
    }

    fn optional_positive_f64(&self, name: &str, label: &'static str) -> ParamResult<Option<f64>> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => {
                let number = value
                    .as_f64()
                    .ok_or(ValidationError::NotPositive(label))?;
                dhruv_store::validation::validate_positive(number, label)?;
                Ok(Some(number))
            }
        }
    }

    fn optional_parsed<T: FromStr>(
        &self,
        name: &str,
        invalid: ValidationError,
    ) -> ParamResult<Option<T>> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => {
                s.trim().parse().map(Some).map_err(|_| invalid.into())
            }
            Some(_) => Err(invalid.into()),
        }
    }

    fn optional_timestamp(&self, name: &str) -> ParamResult<Option<DateTime<Utc>>> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|_| ValidationError::InvalidTimestamp.into()),
            Some(other) => Err(ParameterValidationError::invalid_type(
                "consumedAt",
                "string",
                other,
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model calls the tool by.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's input.
    fn parameters(&self) -> serde_json::Value;

    /// Run the tool. Domain failures belong in the returned [`ToolResult`];
    /// an `Err` means the tool itself could not run.
    async fn execute(&self, params: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Per-turn context handed to every tool call.
///
/// Tools act on behalf of `user_id` only; the model never chooses whose log
/// it writes to.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user_id: Uuid,
    pub chat_id: Option<Uuid>,
    pub turn_id: Uuid,
}

impl ToolContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            chat_id: None,
            turn_id: Uuid::new_v4(),
        }
    }

    pub fn with_chat(mut self, chat_id: Uuid) -> Self {
        self.chat_id = Some(chat_id);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// The `{ success, message | error, data? }` envelope every tool returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: Some(data),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    /// The envelope as a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        let mut value = serde_json::json!({ "success": self.success });
        if let Some(message) = &self.message {
            value["message"] = serde_json::Value::String(message.clone());
        }
        if let Some(error) = &self.error {
            value["error"] = serde_json::Value::String(error.clone());
        }
        if let Some(data) = &self.data {
            value["data"] = data.clone();
        }
        value
    }

    /// The envelope serialized for the model's next turn.
    pub fn to_llm_content(&self) -> String {
        self.to_value().to_string()
    }
}

impl From<ParameterValidationError> for ToolResult {
    fn from(err: ParameterValidationError) -> Self {
        ToolResult::failure(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Tools available to one agent, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions sent with each completion request, in name order.
    pub fn to_llm_definitions(&self) -> Vec<dhruv_llm::ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                dhruv_llm::ToolDefinition::new(tool.name(), tool.description(), tool.parameters())
            })
            .collect()
    }

    /// Run a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        tool.execute(params, ctx).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// Records its calls and answers with a fixed result.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    response: ToolResult,
    calls: std::sync::Mutex<Vec<serde_json::Value>>,
}

#[cfg(test)]
impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: ToolResult::ok("mock response", serde_json::json!({})),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: ToolResult) -> Self {
        self.response = response;
        self
    }

    pub fn calls(&self) -> Vec<serde_json::Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A mock tool for testing"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.lock().unwrap().push(params);
        Ok(self.response.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
