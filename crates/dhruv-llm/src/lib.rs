//! LLM client abstraction for Dhruv.
//!
//! The core abstraction is the [`LlmBackend`] trait. [`OpenAiBackend`] implements
//! it for every OpenAI-compatible provider (OpenAI, Azure OpenAI deployments,
//! Ollama); [`MockBackend`] implements it for tests.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  LlmBackend trait            │
//! │  - complete() -> Response    │
//! └──────────────────────────────┘
//!           │
//!     ┌─────┴──────────┐
//!     ▼                ▼
//! ┌──────────────┐ ┌──────────┐
//! │ OpenAiBackend│ │  Mock    │
//! │ openai/azure/│ └──────────┘
//! │ ollama/custom│
//! └──────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, MockBackend, SharedBackend, text_response, with_retry};
pub use error::{LlmError, RateLimitInfo, ResponseValidationError, Result};
pub use openai::{AuthStyle, OpenAiBackend, OpenAiConfig};
pub use types::{
    CompletionRequest, CompletionResponse, Content, ContentBlock, Message, Role, StopReason,
    ToolDefinition, ToolResultBlock, ToolUseBlock, Usage,
};
