//! Reactive state-to-action engine.
//!
//! reflex-engine watches a snapshot of application state, decides via
//! user-supplied predicates whether to fire an action (typically an AI
//! streaming request through a [`reflex_providers`] provider), and exposes
//! each action's execution lifecycle.
//!
//! ## Modules
//!
//! - [`engine`] -- the engine: configure, update, reconcile, destroy.
//! - [`action`] -- actions, contexts, and callback aliases.
//! - [`rate_limit`] -- reusable debounce/throttle wrappers.
//! - [`idle`] -- inactivity detection layered on top of the engine.
//! - [`error`] -- engine error types.

pub mod action;
pub mod engine;
pub mod error;
pub mod idle;
pub mod rate_limit;

// Re-export the most commonly used types at the crate root.
pub use action::{
    Action, ActionContext, ActionMeta, ConditionFn, ErrorHook, ExecuteFn, TriggerFn, TriggerMeta,
};
pub use engine::{Engine, EngineConfig};
pub use error::{BoxError, EngineError, Result};
pub use idle::{IdleEvent, IdleWatcher};
pub use rate_limit::{Debouncer, GateFn, Throttler};
