//! Coaching agent for Dhruv.
//!
//! - [`Agent`] runs a streamed chat turn: model steps interleaved with tool
//!   calls, at most `max_steps` model calls per turn.
//! - [`tools`] holds the intake logging and memory search tools.
//! - [`memory`] captures durable facts from user messages in the background.
//! - [`prompt`] builds the coach system prompt and chat titles.

pub mod agent;
pub mod error;
pub mod memory;
pub mod prompt;
pub mod stream;
pub mod tool;
pub mod tools;

pub use agent::{Agent, AgentConfig, history_messages};
pub use error::{AgentError, Result};
pub use memory::{
    ExtractedMemory, MemoryClassifier, MemoryExtractor, MemoryPipeline, PipelineOutcome,
};
pub use prompt::{RequestHints, SystemPromptBuilder, UserDetails, generate_title};
pub use stream::{AgentStream, StreamChunk, TurnTranscript, create_turn_stream};
pub use tool::{
    ParamExt, ParamResult, ParameterValidationError, Tool, ToolContext, ToolRegistry, ToolResult,
};
pub use tools::coach_tools;
