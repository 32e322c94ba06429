//! Resumable generations.
//!
//! A [`ResumableStream`] buffers every chunk a generation publishes so that
//! any number of readers can attach at any point: each reader first replays
//! the buffer and then follows new chunks until the generation finishes.
//!
//! The [`StreamContext`] indexes the streams that are still live by stream id.
//! A finished stream is dropped from the context; resuming it afterwards
//! yields `None` and callers fall back to the persisted messages.

use std::collections::HashMap;
use std::sync::Arc;

use dhruv_agent::StreamChunk;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Buffer {
    chunks: Vec<StreamChunk>,
    finished: bool,
}

/// One generation's chunks, shared between the producer and its readers.
#[derive(Debug)]
pub struct ResumableStream {
    id: Uuid,
    buffer: Mutex<Buffer>,
    // Bumped on every publish and on finish.
    version: watch::Sender<u64>,
}

impl ResumableStream {
    pub fn new(id: Uuid) -> Arc<Self> {
        let (version, _) = watch::channel(0);
        Arc::new(Self {
            id,
            buffer: Mutex::new(Buffer::default()),
            version,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Append a chunk. Ignored once the stream has finished.
    pub fn publish(&self, chunk: StreamChunk) {
        {
            let mut buffer = self.buffer.lock();
            if buffer.finished {
                return;
            }
            buffer.chunks.push(chunk);
        }
        self.version.send_modify(|v| *v += 1);
    }

    pub fn finish(&self) {
        self.buffer.lock().finished = true;
        self.version.send_modify(|v| *v += 1);
    }

    pub fn is_finished(&self) -> bool {
        self.buffer.lock().finished
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replay everything published so far, then follow until finished.
    pub fn subscribe(self: &Arc<Self>) -> impl Stream<Item = StreamChunk> + Send + use<> {
        let stream = Arc::clone(self);
        let mut changes = self.version.subscribe();

        async_stream::stream! {
            let mut next = 0;
            loop {
                changes.borrow_and_update();
                let (batch, finished) = {
                    let buffer = stream.buffer.lock();
                    (buffer.chunks[next..].to_vec(), buffer.finished)
                };
                next += batch.len();
                for chunk in batch {
                    yield chunk;
                }
                if finished || changes.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Live generations by stream id.
#[derive(Debug, Default)]
pub struct StreamContext {
    streams: Mutex<HashMap<Uuid, Arc<ResumableStream>>>,
}

impl StreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, stream: Arc<ResumableStream>) {
        debug!(stream_id = %stream.id(), "Registered resumable stream");
        self.streams.lock().insert(stream.id(), stream);
    }

    /// Drop a stream once its generation is over.
    pub fn remove(&self, stream_id: Uuid) -> Option<Arc<ResumableStream>> {
        self.streams.lock().remove(&stream_id)
    }

    /// A reader for a live stream, or `None` when it is unknown or finished.
    pub fn resume(
        &self,
        stream_id: Uuid,
    ) -> Option<impl Stream<Item = StreamChunk> + Send + use<>> {
        let stream = self.streams.lock().get(&stream_id).cloned()?;
        if stream.is_finished() {
            return None;
        }
        Some(stream.subscribe())
    }

}
