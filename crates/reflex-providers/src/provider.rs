//! The streaming-provider contract.
//!
//! A provider is any capability that can turn a [`StreamRequest`] into an
//! incremental stream of [`StreamChunk`]s.  The reactive engine never calls
//! providers itself; action callbacks receive the provider registry and
//! decide which provider to invoke.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::error::Result;
use crate::types::{StreamChunk, StreamRequest};

/// A boxed stream of chunks as produced by [`StreamingProvider::stream`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// The two-method contract every streaming provider implements.
///
/// `stream` is the primary entry point.  `complete` has a default
/// implementation that drains the stream and concatenates the text, so
/// adapters only override it when the backend offers a cheaper
/// non-streaming path.
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// The name this provider is registered under (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Start a streaming response for the given request.
    async fn stream(&self, request: StreamRequest) -> Result<ChunkStream>;

    /// Produce the full response text in one call.
    async fn complete(&self, request: StreamRequest) -> Result<String> {
        let mut stream = self.stream(request).await?;
        let mut output = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            output.push_str(&chunk.content);
            if chunk.done {
                break;
            }
        }

        Ok(output)
    }
}

impl fmt::Debug for dyn StreamingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingProvider")
            .field("name", &self.name())
            .finish()
    }
}
