//! The coaching agent: one model, one tool registry, one config.

use dhruv_llm::{Message, SharedBackend};
use dhruv_store::StoredMessage;
use dhruv_types::{ChatRole, config_defaults};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::stream::{AgentStream, create_turn_stream};
use crate::tool::{ToolContext, ToolRegistry};

/// Per-turn model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Model calls allowed per turn.
    pub max_steps: u32,
    pub system_prompt: Option<String>,
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: config_defaults::MAX_TOKENS,
            temperature: None,
            max_steps: config_defaults::MAX_STEPS,
            system_prompt: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Clamped to at least one step.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Runs chat turns against a backend with a fixed set of tools.
#[derive(Clone)]
pub struct Agent {
    backend: SharedBackend,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(backend: SharedBackend, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            backend,
            tools: Arc::new(tools),
            config,
        }
    }

    /// An agent that can only talk, used for the reasoning model.
    pub fn without_tools(backend: SharedBackend, config: AgentConfig) -> Self {
        Self::new(backend, ToolRegistry::new(), config)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Stream a turn continuing `history`, whose last entry is the new user
    /// message.
    pub fn turn_stream(&self, history: Vec<Message>, ctx: ToolContext) -> AgentStream {
        tracing::info!(
            user_id = %ctx.user_id,
            chat_id = ?ctx.chat_id,
            turn_id = %ctx.turn_id,
            backend = self.backend.name(),
            model = %self.config.model,
            history = history.len(),
            "Turn started"
        );
        create_turn_stream(
            self.backend.clone(),
            self.tools.clone(),
            self.config.clone(),
            history,
            ctx,
        )
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("backend", &self.backend.name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish()
    }
}

/// Convert persisted chat messages into model history.
///
/// Only text parts carry over; messages without text are skipped.
pub fn history_messages(stored: &[StoredMessage]) -> Vec<Message> {
    stored
        .iter()
        .filter_map(|m| {
            let text = m.text();
            if text.trim().is_empty() {
                return None;
            }
            Some(match m.role {
                ChatRole::User => Message::user(text),
                ChatRole::Assistant => Message::assistant(text),
            })
        })
        .collect()
}
