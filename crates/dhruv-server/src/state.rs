//! Application state shared across handlers.

use std::sync::Arc;

use dhruv_agent::{Agent, AgentConfig, MemoryPipeline, ToolRegistry, coach_tools};
use dhruv_llm::SharedBackend;
use dhruv_store::Store;

use crate::config::ServerConfig;
use crate::stream::StreamContext;

/// A backend paired with the model name to request from it.
#[derive(Clone)]
pub struct ModelHandle {
    pub backend: SharedBackend,
    pub model: String,
}

impl ModelHandle {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .finish()
    }
}

/// The models a chat turn can use.
#[derive(Debug, Clone)]
pub struct ChatModels {
    /// `chat-model`, runs with the coach tools.
    pub chat: ModelHandle,
    /// `chat-model-reasoning`, runs without tools.
    pub reasoning: ModelHandle,
    pub title: ModelHandle,
}

impl ChatModels {
    /// Use one model for every role.
    pub fn single(model: ModelHandle) -> Self {
        Self {
            chat: model.clone(),
            reasoning: model.clone(),
            title: model,
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,

    pub models: Arc<ChatModels>,

    /// Tools offered to the chat model, bound to the store.
    pub tools: ToolRegistry,

    /// Background memory capture; `None` when disabled.
    pub memory: Option<MemoryPipeline>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Live generations; `None` when resumable streams are disabled.
    pub streams: Option<Arc<StreamContext>>,
}

impl AppState {
    pub fn new(store: Arc<Store>, models: ChatModels, config: ServerConfig) -> Self {
        let tools = coach_tools(store.clone(), store.clone());
        let streams = config
            .resumable_streams
            .then(|| Arc::new(StreamContext::new()));

        Self {
            store,
            models: Arc::new(models),
            tools,
            memory: None,
            config: Arc::new(config),
            streams,
        }
    }

    pub fn with_memory_pipeline(mut self, pipeline: MemoryPipeline) -> Self {
        self.memory = Some(pipeline);
        self
    }

    /// Agent for the regular chat model, carrying the coach tools.
    pub fn chat_agent(&self, system_prompt: String) -> Agent {
        let model = &self.models.chat;
        Agent::new(
            model.backend.clone(),
            self.tools.clone(),
            self.agent_config(&model.model, system_prompt),
        )
    }

    /// Agent for the reasoning model. It gets no tools.
    pub fn reasoning_agent(&self, system_prompt: String) -> Agent {
        let model = &self.models.reasoning;
        Agent::without_tools(
            model.backend.clone(),
            self.agent_config(&model.model, system_prompt),
        )
    }

    fn agent_config(&self, model: &str, system_prompt: String) -> AgentConfig {
        AgentConfig::new(model)
            .with_max_steps(self.config.max_steps)
            .with_max_tokens(self.config.max_tokens)
            .with_system_prompt(system_prompt)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("models", &self.models)
            .field("tools", &self.tools.names())
            .field("memory", &self.memory.is_some())
            .field("streams", &self.streams.is_some())
            .finish()
    }
}
