//! HTTP provider for OpenAI-compatible Chat Completions endpoints.
//!
//! Covers the OpenAI API itself plus compatible backends (Ollama, Together,
//! vLLM, and most gateway proxies).  Streaming uses SSE via
//! [`crate::sse::SseParser`]; `complete` takes the cheaper non-streaming
//! path.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::provider::{ChunkStream, StreamingProvider};
use crate::sse::SseParser;
use crate::types::{StreamChunk, StreamRequest};

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a single OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// The registry name for this provider (e.g. `"openai"`).
    pub name: String,
    /// API key for authentication.  May be empty for local backends.
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Model used when the request does not name one.
    pub default_model: String,
    /// Token cap used when the request does not set one.
    pub max_tokens: u32,
}

impl HttpProviderConfig {
    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: "openai".to_owned(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            default_model: model.into(),
            max_tokens: 4096,
        }
    }

    /// Create a configuration for any OpenAI-compatible endpoint (e.g.
    /// Ollama, Together, vLLM).
    pub fn compatible(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: model.into(),
            max_tokens: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A [`StreamingProvider`] backed by an OpenAI-compatible HTTP endpoint.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl OpenAiCompatProvider {
    /// Create a provider from a configuration.
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// The chat-completions URL for this endpoint.
    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !self.config.api_key.is_empty() {
            let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|_| ProviderError::InvalidConfig {
                    reason: "API key contains invalid header characters".to_owned(),
                })?;
            headers.insert(AUTHORIZATION, auth);
        }

        Ok(headers)
    }

    /// Serialize a request into the Chat Completions body, filling in
    /// configured defaults for model and max_tokens.
    fn build_body(&self, request: &StreamRequest, stream: bool) -> Result<Value> {
        let mut body = serde_json::to_value(request).map_err(|e| ProviderError::Parse {
            reason: format!("failed to serialize request: {e}"),
        })?;

        let Value::Object(ref mut obj) = body else {
            return Err(ProviderError::Parse {
                reason: "request did not serialize to an object".to_owned(),
            });
        };

        if request.model.is_none() {
            obj.insert("model".to_owned(), json!(self.config.default_model));
        }
        if request.max_tokens.is_none() {
            obj.insert("max_tokens".to_owned(), json!(self.config.max_tokens));
        }
        obj.insert("stream".to_owned(), json!(stream));

        Ok(body)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl StreamingProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn stream(&self, request: StreamRequest) -> Result<ChunkStream> {
        let body = self.build_body(&request, true)?;
        debug!(provider = %self.config.name, "starting streaming request");

        let response = self.send(&body).await?;
        Ok(sse_chunk_stream(Box::pin(response.bytes_stream())))
    }

    async fn complete(&self, request: StreamRequest) -> Result<String> {
        let body = self.build_body(&request, false)?;
        debug!(provider = %self.config.name, "starting completion request");

        let response = self.send(&body).await?;
        let v: Value = response.json().await?;

        Ok(v["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_owned())
    }
}

// ---------------------------------------------------------------------------
// SSE byte stream -> chunk stream
// ---------------------------------------------------------------------------

struct SseStreamState<S> {
    source: S,
    parser: SseParser,
    buffer: String,
    pending: VecDeque<Result<StreamChunk>>,
    finished: bool,
}

impl<S> SseStreamState<S> {
    /// Split buffered bytes into complete lines and feed them to the parser.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.feed(line.trim_end_matches('\n'));
        }
    }

    fn feed(&mut self, line: &str) {
        match self.parser.parse_line(line) {
            Ok(Some(chunk)) => self.pending.push_back(Ok(chunk)),
            Ok(None) => {}
            Err(e) => self.pending.push_back(Err(e)),
        }
    }
}

/// Adapt a raw SSE byte stream into a stream of [`StreamChunk`]s.
///
/// The adapter stops after the first terminal chunk or error; anything the
/// endpoint sends past that point is not polled.
fn sse_chunk_stream<S, B>(source: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, reqwest::Error>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseStreamState {
        source,
        parser: SseParser::new(),
        buffer: String::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() || matches!(&item, Ok(chunk) if chunk.done) {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match st.source.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.push_str(&String::from_utf8_lossy(bytes.as_ref()));
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.pending.push_back(Err(ProviderError::Http(e)));
                }
                None => {
                    st.finished = true;
                    if !st.buffer.is_empty() {
                        let rest = std::mem::take(&mut st.buffer);
                        st.feed(&rest);
                    }
                    if st.pending.is_empty() {
                        return None;
                    }
                }
            }
        }
    });

    Box::pin(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(HttpProviderConfig::openai("sk-test", "gpt-4o-mini"))
    }

    #[test]
    fn openai_config_defaults() {
        let config = HttpProviderConfig::openai("key", "gpt-4o-mini");
        assert_eq!(config.name, "openai");
        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert_eq!(config.max_tokens, 4096);
    }

    #[test]
    fn compatible_config_keeps_custom_base() {
        let config =
            HttpProviderConfig::compatible("ollama", "http://localhost:11434/v1", "", "llama3");
        assert_eq!(config.name, "ollama");
        assert_eq!(config.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let provider = OpenAiCompatProvider::new(HttpProviderConfig::compatible(
            "local",
            "http://localhost:8000/v1/",
            "",
            "m",
        ));
        assert_eq!(
            provider.endpoint(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn body_fills_defaults() {
        let provider = provider();
        let request = StreamRequest::new(vec![Message::user("hi")]);
        let body = provider.build_body(&request, true).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn body_respects_request_overrides() {
        let provider = provider();
        let request = StreamRequest::from_prompt("hi")
            .with_model("gpt-4o")
            .with_max_tokens(64)
            .with_temperature(0.5)
            .with_extra("seed", json!(7));
        let body = provider.build_body(&request, false).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["seed"], 7);
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn chunk_stream_reassembles_split_lines() {
        // One SSE line split across two byte chunks, then the sentinel.
        let bytes: Vec<std::result::Result<Vec<u8>, reqwest::Error>> = vec![
            Ok(br#"data: {"choices":[{"delta":{"con"#.to_vec()),
            Ok(br#"tent":"Hi"},"finish_reason":null}]}"#.to_vec()),
            Ok(b"\ndata: [DONE]\n".to_vec()),
        ];
        let source = Box::pin(futures::stream::iter(bytes));

        let mut stream = sse_chunk_stream(source);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content, "Hi");

        let last = stream.next().await.unwrap().unwrap();
        assert!(last.done);

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn chunk_stream_stops_after_done() {
        let bytes: Vec<std::result::Result<Vec<u8>, reqwest::Error>> = vec![Ok(
            b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n".to_vec(),
        )];
        let source = Box::pin(futures::stream::iter(bytes));

        let mut stream = sse_chunk_stream(source);
        let first = stream.next().await.unwrap().unwrap();
        assert!(first.done);
        assert!(stream.next().await.is_none());
    }
}
