//! Read-only access to the user's stored memories.

use async_trait::async_trait;
use dhruv_store::{MemoryBackend, MemoryRecord};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::tool::{Tool, ToolContext, ToolResult};

/// Upper bound on memories returned to the model in one call.
pub const SEARCH_LIMIT: usize = 100;

/// Lists every active memory for the turn's user, most important first.
pub struct SearchUserMemoryTool {
    backend: Arc<dyn MemoryBackend>,
}

impl SearchUserMemoryTool {
    pub const NAME: &'static str = "search_user_memory";

    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }
}

fn flatten(memory: &MemoryRecord) -> Value {
    json!({
        "id": memory.id,
        "content": memory.memory_content,
        "type": memory.memory_type,
        "importance": memory.importance_score,
        "tags": memory.tags,
        "source": memory.source,
        "createdAt": memory.created_at,
        "updatedAt": memory.updated_at,
    })
}

#[async_trait]
impl Tool for SearchUserMemoryTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search and retrieve stored memories about a user for personalized conversation context"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        match self.backend.active_memories(ctx.user_id, SEARCH_LIMIT) {
            Ok(memories) => {
                debug!(user_id = %ctx.user_id, tool = Self::NAME, count = memories.len(), "Searched memories");
                let formatted: Vec<Value> = memories.iter().map(flatten).collect();
                Ok(ToolResult::ok(
                    format!("Found {} memories for user", memories.len()),
                    json!({
                        "totalMemories": memories.len(),
                        "memories": formatted,
                    }),
                ))
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id, tool = Self::NAME, error = %e, "Failed to search memories");
                Ok(ToolResult::failure(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhruv_store::{NewMemory, Store, StoreError};
    use dhruv_types::{MemoryType, UserKind};
    use uuid::Uuid;

    struct BrokenBackend;

    impl MemoryBackend for BrokenBackend {
        fn add_memory(&self, _: Uuid, _: NewMemory) -> dhruv_store::Result<MemoryRecord> {
            Err(StoreError::InvalidData("locked".into()))
        }

        fn active_memories(&self, _: Uuid, _: usize) -> dhruv_store::Result<Vec<MemoryRecord>> {
            Err(StoreError::InvalidData("locked".into()))
        }
    }

    #[tokio::test]
    async fn test_search_orders_and_flattens() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let user = store.create_user("asha@example.com", UserKind::Regular).unwrap();
        store
            .add_memory(user.id, NewMemory::new("Likes masala chai").with_importance(4))
            .unwrap();
        store
            .add_memory(
                user.id,
                NewMemory::new("Allergic to peanuts")
                    .with_type(MemoryType::Fact)
                    .with_importance(9)
                    .with_tags(vec!["medical".into()]),
            )
            .unwrap();
        let forgotten = store.add_memory(user.id, NewMemory::new("Old goal")).unwrap();
        store.forget_memory(forgotten.id).unwrap();

        let tool = SearchUserMemoryTool::new(store.clone());
        let result = tool.execute(json!({}), &ToolContext::new(user.id)).await.unwrap();

        assert_eq!(result.message.as_deref(), Some("Found 2 memories for user"));
        let data = result.data.unwrap();
        assert_eq!(data["totalMemories"], 2);
        let first = &data["memories"][0];
        assert_eq!(first["content"], "Allergic to peanuts");
        assert_eq!(first["type"], "fact");
        assert_eq!(first["importance"], 9);
        assert_eq!(first["tags"], json!(["medical"]));
        assert_eq!(first["source"], "conversation");
        assert!(first.get("createdAt").is_some());
        assert_eq!(data["memories"][1]["tags"], Value::Null);
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_context_user() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let asha = store.create_user("asha@example.com", UserKind::Regular).unwrap();
        let ravi = store.create_user("ravi@example.com", UserKind::Regular).unwrap();
        store.add_memory(asha.id, NewMemory::new("Runs every morning")).unwrap();

        let tool = SearchUserMemoryTool::new(store.clone());
        let result = tool.execute(json!({}), &ToolContext::new(ravi.id)).await.unwrap();
        assert_eq!(result.data.unwrap()["totalMemories"], 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_structured() {
        let tool = SearchUserMemoryTool::new(Arc::new(BrokenBackend));
        let result = tool
            .execute(json!({}), &ToolContext::new(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("locked"));
    }
}
