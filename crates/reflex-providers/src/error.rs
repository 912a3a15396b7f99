//! Provider error types.
//!
//! All provider implementations surface errors through [`ProviderError`].
//! Each variant carries enough context for callers to decide how to handle
//! the failure.

/// Unified error type for streaming providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    // -- Lookup errors -------------------------------------------------------
    /// No provider with the given name is registered.
    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    // -- Configuration errors ------------------------------------------------
    /// The provider configuration is unusable (e.g. malformed API key).
    #[error("invalid provider configuration: {reason}")]
    InvalidConfig { reason: String },

    // -- Transport errors ----------------------------------------------------
    /// The HTTP request itself failed (connection, TLS, timeout).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status code.
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    // -- Stream errors -------------------------------------------------------
    /// A payload in the stream could not be parsed.
    #[error("failed to parse stream payload: {reason}")]
    Parse { reason: String },

    /// The stream ended or broke before completion.
    #[error("stream error: {reason}")]
    Stream { reason: String },
}

/// Convenience alias used throughout the providers crate.
pub type Result<T> = std::result::Result<T, ProviderError>;
