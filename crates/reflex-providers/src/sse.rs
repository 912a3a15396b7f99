//! SSE stream parser for OpenAI-style Chat Completions streams.
//!
//! The OpenAI streaming format sends `data:` lines in standard SSE format
//! with JSON payloads containing `choices[].delta` objects.  The stream
//! terminates with a `data: [DONE]` sentinel.  This module parses those
//! lines into [`StreamChunk`]s that action callbacks can consume.

use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::types::StreamChunk;

/// Parses raw SSE lines from an OpenAI-compatible streaming endpoint.
///
/// The parser is line-oriented: feed it one line at a time and it returns a
/// [`StreamChunk`] whenever the line carried content, a finish reason, or
/// usage metadata.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Whether the `[DONE]` sentinel has been received.
    done: bool,
}

impl SseParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the `[DONE]` sentinel has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a single line from the SSE stream.
    ///
    /// Returns `Some(chunk)` when the line produced usable output, `None`
    /// for blank lines, comments, and deltas with nothing to report (e.g.
    /// the role-only delta OpenAI sends first).
    pub fn parse_line(&mut self, line: &str) -> Result<Option<StreamChunk>> {
        let line = line.trim_end();

        // SSE comment lines start with `:`.
        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        // OpenAI-compatible endpoints do not use named events; ignore them.
        if line.starts_with("event:") {
            return Ok(None);
        }

        let Some(data) = line.strip_prefix("data:") else {
            tracing::trace!(line, "ignoring unrecognised SSE line");
            return Ok(None);
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return Ok(Some(StreamChunk::end()));
        }

        self.parse_data(data)
    }

    /// Parse the JSON payload of a `data:` line.
    fn parse_data(&self, data: &str) -> Result<Option<StreamChunk>> {
        let v: Value = serde_json::from_str(data).map_err(|e| ProviderError::Parse {
            reason: format!("invalid JSON in SSE data: {e}"),
        })?;

        let choice = &v["choices"][0];
        let content = choice["delta"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        let finished = !choice["finish_reason"].is_null();

        // Usage arrives on the final chunk for endpoints that report it.
        let metadata = v.get("usage").filter(|u| !u.is_null()).cloned();

        if content.is_empty() && !finished && metadata.is_none() {
            // Role-only or otherwise empty delta; nothing to surface.
            return Ok(None);
        }

        Ok(Some(StreamChunk {
            content,
            done: finished,
            metadata,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
