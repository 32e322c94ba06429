//! Long-term user memory: classify, extract, persist.

mod classifier;
mod extractor;
mod pipeline;

pub use classifier::MemoryClassifier;
pub use extractor::{ExtractedMemory, MemoryExtractor};
pub use pipeline::{MemoryPipeline, PipelineOutcome};
