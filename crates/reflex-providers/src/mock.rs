//! Scripted provider for tests and local development.
//!
//! [`ScriptedProvider`] replays a canned sequence of chunks, optionally with
//! an injected mid-stream failure or per-chunk latency, and counts how often
//! it was called.  Both this crate's tests and the engine's tests drive
//! their provider paths through it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::{ProviderError, Result};
use crate::provider::{ChunkStream, StreamingProvider};
use crate::types::{StreamChunk, StreamRequest};

/// A provider that streams a fixed script instead of calling a backend.
pub struct ScriptedProvider {
    name: String,
    parts: Vec<String>,
    /// Emit an error after this many chunks instead of finishing the script.
    fail_after: Option<usize>,
    /// Sleep this long before each chunk to simulate network latency.
    chunk_delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Create a provider that streams `parts` in order, followed by a
    /// terminal chunk.
    pub fn new(name: impl Into<String>, parts: &[&str]) -> Self {
        Self {
            name: name.into(),
            parts: parts.iter().map(|p| (*p).to_owned()).collect(),
            fail_after: None,
            chunk_delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Emit a [`ProviderError::Stream`] after `count` chunks.
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Delay each chunk by `delay` to simulate latency.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// How many times `stream` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Build the item sequence the stream will replay.
    fn script(&self) -> Vec<Result<StreamChunk>> {
        let mut items: Vec<Result<StreamChunk>> =
            self.parts.iter().map(|p| Ok(StreamChunk::text(p))).collect();

        match self.fail_after {
            Some(count) => {
                items.truncate(count);
                items.push(Err(ProviderError::Stream {
                    reason: "scripted failure".to_owned(),
                }));
            }
            None => items.push(Ok(StreamChunk::end())),
        }

        items
    }
}

#[async_trait]
impl StreamingProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, _request: StreamRequest) -> Result<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.chunk_delay;
        let stream = futures::stream::iter(self.script()).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });

        Ok(Box::pin(stream))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
