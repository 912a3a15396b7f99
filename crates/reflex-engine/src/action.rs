//! Actions — named units of trigger + conditions + execute + rate policy.
//!
//! An action watches state transitions through its trigger predicate.  When
//! the trigger passes (and every declared condition holds), the engine
//! invokes the action's async `execute` callback with an [`ActionContext`]
//! carrying the new state, the provider registry, and transition metadata.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reflex_providers::{ProviderRegistry, StreamingProvider};
use uuid::Uuid;

use crate::error::{BoxError, EngineError};

// ---------------------------------------------------------------------------
// Callback aliases
// ---------------------------------------------------------------------------

/// Predicate over a state transition.  Returning `true` makes the action a
/// candidate to run for this update.
pub type TriggerFn<T> = Arc<dyn Fn(&T, &T, &TriggerMeta) -> bool + Send + Sync>;

/// Additional gate evaluated against the built context after the trigger.
pub type ConditionFn<T> = Arc<dyn Fn(&ActionContext<T>) -> bool + Send + Sync>;

/// The async work an action performs.
///
/// We box the future so that callers can supply arbitrary async work
/// without leaking concrete types into the engine.
pub type ExecuteFn<T> =
    Arc<dyn Fn(ActionContext<T>) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;

/// Hook invoked once per failing action per update.
pub type ErrorHook<T> = Arc<dyn Fn(&EngineError, &ActionContext<T>) + Send + Sync>;

// ---------------------------------------------------------------------------
// Metadata and context
// ---------------------------------------------------------------------------

/// Metadata handed to trigger predicates.
#[derive(Debug, Clone, Copy)]
pub struct TriggerMeta {
    /// When the state update that is being evaluated was observed.
    pub timestamp: DateTime<Utc>,
}

/// Metadata carried by an [`ActionContext`].
#[derive(Clone)]
pub struct ActionMeta<T> {
    /// The id of the action this context was built for.
    pub trigger_id: String,
    /// When the triggering state update was observed.
    pub timestamp: DateTime<Utc>,
    /// The state snapshot before the transition.
    pub previous: T,
}

/// Ephemeral value passed to conditions and `execute`.
///
/// Built fresh for every evaluation and never retained by the engine past
/// the call.
#[derive(Clone)]
pub struct ActionContext<T> {
    /// The state snapshot after the transition.
    pub state: T,
    /// The provider registry shared by all actions.
    pub providers: Arc<ProviderRegistry>,
    /// Transition metadata.
    pub meta: ActionMeta<T>,
}

impl<T> ActionContext<T> {
    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Option<Arc<dyn StreamingProvider>> {
        self.providers.get(name)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A registered unit of reactive behavior.
///
/// Built with [`Action::new`] and the `with_*` methods, then handed to the
/// engine, which owns it exclusively from that point on.  Ids are unique
/// within an engine; registering a second action with the same id replaces
/// the first.
pub struct Action<T> {
    pub(crate) id: String,
    pub(crate) trigger: TriggerFn<T>,
    pub(crate) execute: ExecuteFn<T>,
    pub(crate) conditions: Vec<ConditionFn<T>>,
    pub(crate) prevent_reentry: bool,
    pub(crate) debounce: Option<Duration>,
    pub(crate) throttle: Option<Duration>,
}

impl<T> Action<T> {
    /// Create an action from a trigger predicate and an execute callback.
    ///
    /// A unique id is generated; override it with [`Action::with_id`].
    pub fn new<Tr, Ex, Fut>(trigger: Tr, execute: Ex) -> Self
    where
        Tr: Fn(&T, &T, &TriggerMeta) -> bool + Send + Sync + 'static,
        Ex: Fn(ActionContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        Self {
            id: Uuid::now_v7().to_string(),
            trigger: Arc::new(trigger),
            execute: Arc::new(move |ctx| Box::pin(execute(ctx))),
            conditions: Vec::new(),
            prevent_reentry: false,
            debounce: None,
            throttle: None,
        }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a condition that must hold for the action to run.
    pub fn with_condition<C>(mut self, condition: C) -> Self
    where
        C: Fn(&ActionContext<T>) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Skip this action while a previous execution of it is still in flight.
    pub fn prevent_reentry(mut self, enabled: bool) -> Self {
        self.prevent_reentry = enabled;
        self
    }

    /// Delay execution until no further trigger lands for `delay`.
    ///
    /// Only the context of the last trigger within the quiet window is used.
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// Run at most once per `limit`; triggers during the cooldown are
    /// dropped, not queued.
    pub fn with_throttle(mut self, limit: Duration) -> Self {
        self.throttle = Some(limit);
        self
    }

    /// The action's id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_action() -> Action<i32> {
        Action::new(|prev, curr, _meta| prev != curr, |_ctx| async { Ok(()) })
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = noop_action();
        let b = noop_action();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn with_id_overrides_generated() {
        let action = noop_action().with_id("refresh-summary");
        assert_eq!(action.id(), "refresh-summary");
    }

    #[test]
    fn builder_records_rate_policy() {
        let action = noop_action()
            .with_debounce(Duration::from_millis(100))
            .with_throttle(Duration::from_secs(1))
            .prevent_reentry(true)
            .with_condition(|ctx| ctx.state > 0);

        assert_eq!(action.debounce, Some(Duration::from_millis(100)));
        assert_eq!(action.throttle, Some(Duration::from_secs(1)));
        assert!(action.prevent_reentry);
        assert_eq!(action.conditions.len(), 1);
    }

    #[test]
    fn context_provider_lookup_misses_on_empty_registry() {
        let ctx = ActionContext {
            state: 1,
            providers: Arc::new(ProviderRegistry::new()),
            meta: ActionMeta {
                trigger_id: "t".into(),
                timestamp: Utc::now(),
                previous: 0,
            },
        };
        assert!(ctx.provider("openai").is_none());
    }
}
