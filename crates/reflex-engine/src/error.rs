//! Engine error types.
//!
//! Misuse of the engine surface (configuring a destroyed engine) fails the
//! offending call directly.  Failures inside user `execute` callbacks are a
//! different species: they are caught per action, wrapped in
//! [`EngineError::ActionFailed`], handed to the configured error hook, and
//! never allowed to escape `update_state`.

/// Boxed error produced by user `execute` callbacks.
///
/// Provider errors raised inside a callback travel through this same type,
/// so the source chain of an [`EngineError::ActionFailed`] reaches the
/// original failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for the reactive engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine has been destroyed and can no longer be configured.
    #[error("engine has been destroyed")]
    Destroyed,

    /// An action's `execute` callback failed.
    ///
    /// Delivered to the error hook; never returned from `update_state`.
    #[error("action `{action_id}` failed: {source}")]
    ActionFailed {
        action_id: String,
        #[source]
        source: BoxError,
    },

    /// The idle watcher was started while already running.
    #[error("idle watcher is already running")]
    WatcherAlreadyRunning,
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;
