//! Wire types shared by every streaming provider.
//!
//! These types model the data flowing between action callbacks and provider
//! implementations.  They are provider-agnostic at this layer; concrete
//! adapters (e.g. [`crate::http`]) translate them into provider-specific
//! wire formats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user.
    User,
    /// Output from the model.
    Assistant,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A full request to send to a streaming provider.
///
/// Only `messages` is mandatory.  `model`, `temperature`, and `max_tokens`
/// fall back to provider defaults when unset.  `extra` carries arbitrary
/// provider-specific parameters that are forwarded verbatim.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamRequest {
    /// The conversation history.
    pub messages: Vec<Message>,

    /// The model identifier (e.g. `"gpt-4o-mini"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Additional provider-specific parameters, forwarded unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl StreamRequest {
    /// Create a request from a conversation history.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Create a request holding a single user message.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![Message::user(prompt)])
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum token count.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Attach an arbitrary provider-specific parameter.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// Stream chunks
// ---------------------------------------------------------------------------

/// A single increment of a provider's streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// The text produced in this increment.  May be empty for terminal or
    /// metadata-only chunks.
    pub content: String,

    /// `true` when the provider signalled the end of the response.
    #[serde(default)]
    pub done: bool,

    /// Provider-specific metadata (e.g. token usage in the final chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl StreamChunk {
    /// Create a plain text chunk.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
            metadata: None,
        }
    }

    /// Create the terminal chunk of a stream.
    pub fn end() -> Self {
        Self {
            content: String::new(),
            done: true,
            metadata: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("You are helpful.");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are helpful.");

        let user = Message::user("Hello!");
        assert_eq!(user.role, Role::User);

        let assistant = Message::assistant("Hi there.");
        assert_eq!(assistant.role, Role::Assistant);
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn request_builder_chain() {
        let request = StreamRequest::from_prompt("summarize this")
            .with_model("gpt-4o-mini")
            .with_temperature(0.2)
            .with_max_tokens(256)
            .with_extra("top_p", serde_json::json!(0.9));

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.extra["top_p"], serde_json::json!(0.9));
    }

    #[test]
    fn extra_params_flatten_into_payload() {
        let request = StreamRequest::from_prompt("hi").with_extra("seed", serde_json::json!(7));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["seed"], 7);
        // Unset optionals must not appear at all.
        assert!(json.get("model").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn chunk_constructors() {
        let chunk = StreamChunk::text("hello");
        assert_eq!(chunk.content, "hello");
        assert!(!chunk.done);

        let end = StreamChunk::end();
        assert!(end.done);
        assert!(end.content.is_empty());
    }
}
