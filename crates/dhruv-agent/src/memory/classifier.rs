//! Decides whether an utterance is worth remembering.

use dhruv_llm::{CompletionRequest, Message, SharedBackend};
use dhruv_types::config_defaults::{MEMORY_FALLBACK_CHARS, MEMORY_MIN_CHARS};
use tracing::{debug, warn};

const CLASSIFIER_MAX_TOKENS: u32 = 10;

const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a memory analyzer. Determine if a user message contains information worth remembering for future conversations.

Store messages that contain:
- Personal preferences (food, exercise, lifestyle)
- Goals and aspirations
- Health information or medical conditions
- Routines and habits
- Important facts about the user
- Meaningful experiences or context

DO NOT store messages that are:
- Simple greetings (hi, hello, thanks)
- Basic questions without personal context
- Very short responses (ok, yes, no, sure)
- Commands or requests without personal information

Respond with only "YES" if it should be stored, or "NO" if it shouldn't."#;

/// Model-backed yes/no gate in front of the extractor.
#[derive(Clone)]
pub struct MemoryClassifier {
    backend: SharedBackend,
    model: String,
}

impl MemoryClassifier {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Never fails: a model error falls back to a length heuristic.
    pub async fn classify(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < MEMORY_MIN_CHARS {
            return false;
        }

        let request = CompletionRequest::new(
            &self.model,
            vec![Message::user(format!(
                "Should this message be stored as a memory? Message: \"{trimmed}\""
            ))],
            CLASSIFIER_MAX_TOKENS,
        )
        .with_system(CLASSIFIER_SYSTEM_PROMPT);

        match self.backend.complete(request).await {
            Ok(response) => {
                let answer = response.text();
                let memorable = answer.trim().eq_ignore_ascii_case("YES");
                debug!(answer = %answer.trim(), memorable, "Classified utterance");
                memorable
            }
            Err(e) => {
                let memorable = trimmed.chars().count() > MEMORY_FALLBACK_CHARS;
                warn!(error = %e, memorable, "Classifier call failed, using length heuristic");
                memorable
            }
        }
    }
}

impl std::fmt::Debug for MemoryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClassifier")
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhruv_llm::MockBackend;
    use std::sync::Arc;

    fn classifier(backend: &Arc<MockBackend>) -> MemoryClassifier {
        MemoryClassifier::new(backend.clone(), "memory-model")
    }

    #[tokio::test]
    async fn test_short_text_skips_model() {
        let backend = Arc::new(MockBackend::with_text("YES"));
        assert!(!classifier(&backend).classify("  ok  ").await);
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_yes_answer() {
        for answer in ["YES", " yes\n", "Yes"] {
            let backend = Arc::new(MockBackend::with_text(answer));
            assert!(classifier(&backend).classify("I am vegetarian").await, "{answer:?}");
        }
    }

    #[tokio::test]
    async fn test_anything_else_is_no() {
        for answer in ["NO", "YES.", "Yes, store it", ""] {
            let backend = Arc::new(MockBackend::with_text(answer));
            assert!(!classifier(&backend).classify("ok thanks a lot").await, "{answer:?}");
        }
    }

    #[tokio::test]
    async fn test_request_shape() {
        let backend = Arc::new(MockBackend::with_text("NO"));
        classifier(&backend).classify("  I hate karela  ").await;

        let request = &backend.requests()[0];
        assert_eq!(request.model, "memory-model");
        assert_eq!(request.max_tokens, 10);
        assert!(request.system.as_deref().unwrap().starts_with("You are a memory analyzer"));
        assert_eq!(
            request.messages[0].content.to_text(),
            "Should this message be stored as a memory? Message: \"I hate karela\""
        );
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_length() {
        let backend = Arc::new(MockBackend::failing("timeout"));
        let classifier = classifier(&backend);
        assert!(classifier.classify("I sleep at 11pm daily").await);
        assert!(!classifier.classify("hello bro").await);
    }
}
