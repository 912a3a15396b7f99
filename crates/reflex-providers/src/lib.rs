//! Streaming provider contract and adapters for reflex.
//!
//! This crate defines the two-method contract every AI streaming backend
//! implements — [`StreamingProvider::stream`] and
//! [`StreamingProvider::complete`] — plus the plumbing around it:
//!
//! - [`types`] -- provider-agnostic wire types (messages, requests, chunks).
//! - [`provider`] -- the [`StreamingProvider`] trait and stream alias.
//! - [`registry`] -- the name-keyed [`ProviderRegistry`] shared with every
//!   action context.
//! - [`sse`] -- incremental SSE parsing for OpenAI-style streams.
//! - [`http`] -- an adapter for OpenAI-compatible Chat Completions
//!   endpoints.
//! - [`mock`] -- a scripted provider for tests and local development.
//! - [`error`] -- provider error types.

pub mod error;
pub mod http;
pub mod mock;
pub mod provider;
pub mod registry;
pub mod sse;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use error::{ProviderError, Result};
pub use http::{HttpProviderConfig, OpenAiCompatProvider};
pub use mock::ScriptedProvider;
pub use provider::{ChunkStream, StreamingProvider};
pub use registry::ProviderRegistry;
pub use sse::SseParser;
pub use types::{Message, Role, StreamChunk, StreamRequest};
