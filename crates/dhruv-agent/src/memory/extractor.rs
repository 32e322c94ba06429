//! Turns an utterance into a structured memory.

use dhruv_llm::{CompletionRequest, Message, SharedBackend};
use dhruv_store::NewMemory;
use dhruv_store::validation::truncate_chars;
use dhruv_types::config_defaults::MEMORY_CONTENT_MAX_CHARS;
use dhruv_types::{MEMORY_TAGS, MemorySource, MemoryType};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AgentError, Result};

const EXTRACTOR_MAX_TOKENS: u32 = 200;

/// Length of the utterance prefix kept by the fallback.
const FALLBACK_CHARS: usize = 100;
const FALLBACK_IMPORTANCE: i64 = 5;

const EXTRACTOR_SYSTEM_PROMPT: &str = r#"You are a memory extractor. Extract and summarize the key information from user messages that should be remembered.

Create a concise memory entry (max 100 characters) that captures the essential information.

Classify the memory type:
- preference: likes, dislikes, preferences
- goal: aspirations, targets, objectives
- fact: personal facts, conditions, circumstances
- routine: habits, regular activities, schedules
- general: other meaningful information

Rate importance (1-10):
- 9-10: Critical health/medical info, major goals
- 7-8: Important preferences, significant facts
- 5-6: Regular habits, moderate preferences
- 3-4: Minor preferences, general info
- 1-2: Least important context

Extract relevant tags from: nutrition, fitness, health, sleep, hydration, weight, medical, work, family, hobby

Respond in this exact JSON format:
{
  "memoryContent": "concise summary",
  "memoryType": "type",
  "importanceScore": number,
  "tags": ["tag1", "tag2"]
}"#;

/// A memory ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMemory {
    pub memory_content: String,
    pub memory_type: MemoryType,
    /// Within 1..=10.
    pub importance_score: i64,
    /// Drawn from [`MEMORY_TAGS`].
    pub tags: Vec<String>,
}

impl ExtractedMemory {
    /// The deterministic result used when the model cannot be relied on.
    pub fn fallback(text: &str) -> Self {
        let text = text.trim();
        let mut content: String = text.chars().take(FALLBACK_CHARS).collect();
        if text.chars().count() > FALLBACK_CHARS {
            content.push_str("...");
        }
        Self {
            memory_content: content,
            memory_type: MemoryType::General,
            importance_score: FALLBACK_IMPORTANCE,
            tags: Vec::new(),
        }
    }

    /// Parse model output, tolerating prose or code fences around the JSON.
    pub fn parse(raw: &str) -> Result<Self> {
        let json = json_object(raw)
            .ok_or_else(|| AgentError::invalid_output("no JSON object in extractor output"))?;
        let value: Value = serde_json::from_str(json)?;

        let content = value
            .get("memoryContent")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AgentError::invalid_output("missing memoryContent"))?;

        let memory_type = value
            .get("memoryType")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::invalid_output("missing memoryType"))?
            .trim()
            .to_ascii_lowercase()
            .parse::<MemoryType>()
            .map_err(|e| AgentError::invalid_output(e.to_string()))?;

        let score = value
            .get("importanceScore")
            .and_then(Value::as_f64)
            .filter(|s| s.is_finite())
            .ok_or_else(|| AgentError::invalid_output("missing importanceScore"))?;

        Ok(Self {
            memory_content: truncate_chars(content, MEMORY_CONTENT_MAX_CHARS),
            memory_type,
            importance_score: (score.round() as i64).clamp(1, 10),
            tags: parse_tags(value.get("tags")),
        })
    }

    pub fn into_new_memory(self) -> NewMemory {
        NewMemory::new(self.memory_content)
            .with_type(self.memory_type)
            .with_importance(self.importance_score)
            .with_tags(self.tags)
            .with_source(MemorySource::Conversation)
    }
}

/// The outermost `{ ... }` span of `raw`.
fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Known tags only, lowercased, first occurrence wins.
fn parse_tags(tags: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = tags else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::new();
    for tag in items.iter().filter_map(Value::as_str) {
        let tag = tag.trim().to_ascii_lowercase();
        if MEMORY_TAGS.contains(&tag.as_str()) && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Model-backed summariser for memorable utterances.
#[derive(Clone)]
pub struct MemoryExtractor {
    backend: SharedBackend,
    model: String,
}

impl MemoryExtractor {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Never fails: any model or parse error yields [`ExtractedMemory::fallback`].
    pub async fn extract(&self, text: &str) -> ExtractedMemory {
        match self.try_extract(text).await {
            Ok(memory) => {
                debug!(
                    memory_type = %memory.memory_type,
                    importance = memory.importance_score,
                    tags = memory.tags.len(),
                    "Extracted memory"
                );
                memory
            }
            Err(e) => {
                warn!(error = %e, "Memory extraction failed, using fallback");
                ExtractedMemory::fallback(text)
            }
        }
    }

    async fn try_extract(&self, text: &str) -> Result<ExtractedMemory> {
        let request = CompletionRequest::new(
            &self.model,
            vec![Message::user(format!(
                "Extract key information from: \"{text}\""
            ))],
            EXTRACTOR_MAX_TOKENS,
        )
        .with_system(EXTRACTOR_SYSTEM_PROMPT);

        let response = self.backend.complete(request).await?;
        ExtractedMemory::parse(&response.text())
    }
}

impl std::fmt::Debug for MemoryExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryExtractor")
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhruv_llm::MockBackend;
    use std::sync::Arc;

    #[test]
    fn test_parse_plain_json() {
        let memory = ExtractedMemory::parse(
            r#"{"memoryContent": "Allergic to peanuts", "memoryType": "fact", "importanceScore": 9, "tags": ["medical", "nutrition"]}"#,
        )
        .unwrap();
        assert_eq!(memory.memory_content, "Allergic to peanuts");
        assert_eq!(memory.memory_type, MemoryType::Fact);
        assert_eq!(memory.importance_score, 9);
        assert_eq!(memory.tags, vec!["medical", "nutrition"]);
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let raw = "Here you go:\n```json\n{\"memoryContent\": \"Walks 10k steps\", \"memoryType\": \"Goal\", \"importanceScore\": 7}\n```";
        let memory = ExtractedMemory::parse(raw).unwrap();
        assert_eq!(memory.memory_type, MemoryType::Goal);
        assert!(memory.tags.is_empty());
    }

    #[test]
    fn test_parse_clamps_and_truncates() {
        let long = "a".repeat(250);
        let raw = format!(
            r#"{{"memoryContent": "{long}", "memoryType": "general", "importanceScore": 42}}"#
        );
        let memory = ExtractedMemory::parse(&raw).unwrap();
        assert_eq!(memory.memory_content.chars().count(), 200);
        assert_eq!(memory.importance_score, 10);

        let low = ExtractedMemory::parse(
            r#"{"memoryContent": "x", "memoryType": "general", "importanceScore": -3}"#,
        )
        .unwrap();
        assert_eq!(low.importance_score, 1);
    }

    #[test]
    fn test_parse_filters_tags() {
        let memory = ExtractedMemory::parse(
            r#"{"memoryContent": "x", "memoryType": "routine", "importanceScore": 5, "tags": ["Sleep", 3, "astrology", "sleep", null]}"#,
        )
        .unwrap();
        assert_eq!(memory.tags, vec!["sleep"]);

        let memory = ExtractedMemory::parse(
            r#"{"memoryContent": "x", "memoryType": "routine", "importanceScore": 5, "tags": "sleep"}"#,
        )
        .unwrap();
        assert!(memory.tags.is_empty());
    }

    #[test]
    fn test_parse_rejections() {
        for raw in [
            "no json here",
            r#"{"memoryType": "fact", "importanceScore": 5}"#,
            r#"{"memoryContent": "  ", "memoryType": "fact", "importanceScore": 5}"#,
            r#"{"memoryContent": "x", "memoryType": "habit", "importanceScore": 5}"#,
            r#"{"memoryContent": "x", "memoryType": "fact"}"#,
            r#"{"memoryContent": "x", "memoryType": "fact", "importanceScore": "high"}"#,
            r#"{"memoryContent": "x", "#,
        ] {
            assert!(ExtractedMemory::parse(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_fallback() {
        let short = ExtractedMemory::fallback("  I love dosa  ");
        assert_eq!(short.memory_content, "I love dosa");
        assert_eq!(short.memory_type, MemoryType::General);
        assert_eq!(short.importance_score, 5);
        assert!(short.tags.is_empty());

        let long = ExtractedMemory::fallback(&"b".repeat(150));
        assert_eq!(long.memory_content, format!("{}...", "b".repeat(100)));
    }

    #[tokio::test]
    async fn test_extract_uses_model() {
        let backend = Arc::new(MockBackend::with_text(
            r#"{"memoryContent": "Vegetarian", "memoryType": "preference", "importanceScore": 7, "tags": ["nutrition"]}"#,
        ));
        let extractor = MemoryExtractor::new(backend.clone(), "memory-model");

        let memory = extractor.extract("I am vegetarian").await;
        assert_eq!(memory.memory_type, MemoryType::Preference);

        let request = &backend.requests()[0];
        assert_eq!(request.max_tokens, 200);
        assert_eq!(
            request.messages[0].content.to_text(),
            "Extract key information from: \"I am vegetarian\""
        );
    }

    #[tokio::test]
    async fn test_extract_falls_back_on_bad_output() {
        let backend = Arc::new(MockBackend::with_text(r#"{"memoryContent": "Vegetar"#));
        let extractor = MemoryExtractor::new(backend, "memory-model");
        assert_eq!(
            extractor.extract("I am vegetarian").await,
            ExtractedMemory::fallback("I am vegetarian")
        );
    }

    #[tokio::test]
    async fn test_extract_falls_back_on_call_error() {
        let extractor = MemoryExtractor::new(Arc::new(MockBackend::failing("500")), "memory-model");
        let memory = extractor.extract("Sleeps at 11pm").await;
        assert_eq!(memory.memory_type, MemoryType::General);
        assert_eq!(memory.importance_score, 5);
    }

    #[test]
    fn test_into_new_memory() {
        let memory = ExtractedMemory::fallback("Drinks 3L water").into_new_memory();
        assert_eq!(memory.source, MemorySource::Conversation);
        assert_eq!(memory.memory_content, "Drinks 3L water");
    }
}
