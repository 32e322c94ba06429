//! Built-in tools available to the coaching agent.

mod intake;
mod memory;

pub use intake::{
    CalorieIntakeParams, LogCaloriesIntakeTool, LogWaterIntakeTool, WaterIntakeParams,
};
pub use memory::{SEARCH_LIMIT, SearchUserMemoryTool};

use dhruv_store::{IntakeBackend, MemoryBackend};
use std::sync::Arc;

use crate::tool::ToolRegistry;

/// The registry used by the chat model: intake logging plus memory search.
pub fn coach_tools(
    intake: Arc<dyn IntakeBackend>,
    memory: Arc<dyn MemoryBackend>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(LogWaterIntakeTool::new(intake.clone()));
    registry.register(LogCaloriesIntakeTool::new(intake));
    registry.register(SearchUserMemoryTool::new(memory));
    registry
}
