//! Fire-and-forget memory capture for user chat messages.
//!
//! [`MemoryPipeline::spawn`] schedules [`MemoryPipeline::run`] on the runtime
//! and returns immediately. The run never propagates a failure: a short
//! message, a "no" from the classifier or a store error each end the run with
//! a [`PipelineOutcome`] that is logged and dropped. A panic inside the run is
//! caught by the supervising task.

use dhruv_store::{MemoryBackend, MemoryRecord};
use dhruv_types::config_defaults::MEMORY_MIN_CHARS;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{MemoryClassifier, MemoryExtractor};

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Trimmed text was below the minimum length; no model was called.
    TooShort,
    /// The classifier declined.
    NotMemorable,
    Stored(MemoryRecord),
    /// Persisting the memory failed.
    Failed(String),
}

#[derive(Clone)]
pub struct MemoryPipeline {
    classifier: MemoryClassifier,
    extractor: MemoryExtractor,
    store: Arc<dyn MemoryBackend>,
}

impl MemoryPipeline {
    pub fn new(
        classifier: MemoryClassifier,
        extractor: MemoryExtractor,
        store: Arc<dyn MemoryBackend>,
    ) -> Self {
        Self {
            classifier,
            extractor,
            store,
        }
    }

    /// Classify, extract and persist one utterance.
    pub async fn run(&self, user_id: Uuid, text: &str) -> PipelineOutcome {
        let text = text.trim();
        if text.chars().count() < MEMORY_MIN_CHARS {
            return PipelineOutcome::TooShort;
        }

        if !self.classifier.classify(text).await {
            return PipelineOutcome::NotMemorable;
        }

        let extracted = self.extractor.extract(text).await;
        match self.store.add_memory(user_id, extracted.into_new_memory()) {
            Ok(record) => PipelineOutcome::Stored(record),
            Err(e) => PipelineOutcome::Failed(e.to_string()),
        }
    }

    /// Run in the background. The returned handle resolves once the run and
    /// its logging are done; callers are free to drop it.
    pub fn spawn(&self, user_id: Uuid, text: impl Into<String>) -> JoinHandle<()> {
        let pipeline = self.clone();
        let text = text.into();
        let inner = tokio::spawn(async move { pipeline.run(user_id, &text).await });

        tokio::spawn(async move {
            match inner.await {
                Ok(PipelineOutcome::Stored(record)) => info!(
                    user_id = %user_id,
                    memory_id = %record.id,
                    memory_type = %record.memory_type,
                    importance = record.importance_score,
                    "Stored memory"
                ),
                Ok(PipelineOutcome::Failed(reason)) => {
                    warn!(user_id = %user_id, error = %reason, "Failed to store memory")
                }
                Ok(outcome) => debug!(user_id = %user_id, ?outcome, "Message not stored as memory"),
                Err(e) if e.is_panic() => error!(user_id = %user_id, "Memory pipeline panicked"),
                Err(e) => warn!(user_id = %user_id, error = %e, "Memory pipeline task ended early"),
            }
        })
    }
}

impl std::fmt::Debug for MemoryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPipeline")
            .field("classifier", &self.classifier)
            .field("extractor", &self.extractor)
            .finish()
    }
}
