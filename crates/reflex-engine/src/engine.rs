//! The reactive engine.
//!
//! The engine owns a current/previous snapshot pair of the watched state, a
//! registry of actions, and an in-flight tracker.  Every [`Engine::update_state`]
//! call evaluates all registered actions against the transition, honoring
//! trigger predicates, declared conditions, per-action debounce/throttle
//! wrapping, and the re-entry guard, then invokes the matching actions'
//! execute callbacks concurrently.
//!
//! The handle is cheaply cloneable (`Arc`-backed) and safe to share across
//! tasks; state producers on different tasks may all push updates through
//! their own clone.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use reflex_providers::ProviderRegistry;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::action::{Action, ActionContext, ActionMeta, ErrorHook, ExecuteFn, TriggerMeta};
use crate::error::{EngineError, Result};
use crate::rate_limit::{Debouncer, GateFn, Throttler};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything the engine needs to start watching state.
pub struct EngineConfig<T> {
    /// The first snapshot of the watched state.
    pub initial_state: T,
    /// Providers made available to every action context.
    pub providers: Arc<ProviderRegistry>,
    /// Actions to register.
    pub actions: Vec<Action<T>>,
    /// Hook invoked once per failing action per update.
    pub on_error: Option<ErrorHook<T>>,
    /// Emit trace lines for configuration, registration, updates, and skips.
    pub debug: bool,
}

impl<T> EngineConfig<T> {
    /// Create a configuration with the given initial state and no actions,
    /// providers, or error hook.
    pub fn new(initial_state: T) -> Self {
        Self {
            initial_state,
            providers: Arc::new(ProviderRegistry::new()),
            actions: Vec::new(),
            on_error: None,
            debug: false,
        }
    }

    /// Set the provider registry.
    pub fn with_providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = providers;
        self
    }

    /// Add a single action.
    pub fn with_action(mut self, action: Action<T>) -> Self {
        self.actions.push(action);
        self
    }

    /// Add several actions.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action<T>>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Set the error hook.
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EngineError, &ActionContext<T>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Enable or disable debug tracing.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct Snapshot<T> {
    current: Option<T>,
    previous: Option<T>,
}

/// An action plus its rate-limited invoker, as stored by the engine.
struct RegisteredAction<T> {
    action: Action<T>,
    invoker: Invoker<T>,
}

/// How an action's wrapped execute is actually dispatched.
enum Invoker<T> {
    Direct(GateFn<ActionContext<T>>),
    Throttled(Throttler<ActionContext<T>>),
    Debounced(Debouncer<ActionContext<T>>),
}

struct EngineInner<T> {
    snapshot: RwLock<Snapshot<T>>,
    actions: DashMap<String, Arc<RegisteredAction<T>>>,
    /// Ids of actions whose (wrapped) execute is currently being awaited.
    /// A logical guard for the re-entry check, not a mutual-exclusion lock.
    in_flight: DashSet<String>,
    providers: RwLock<Arc<ProviderRegistry>>,
    /// Shared with the execute wrappers so a reconfigured hook takes effect
    /// for already-registered actions.
    on_error: Arc<RwLock<Option<ErrorHook<T>>>>,
    debug: Arc<AtomicBool>,
    configured: AtomicBool,
    destroyed: AtomicBool,
}

/// Wrap a user execute callback with start/completion tracing and error
/// capture.  Failures are wrapped in [`EngineError::ActionFailed`], handed
/// to the error hook, and absorbed.
fn wrap_execute<T>(
    action_id: String,
    execute: ExecuteFn<T>,
    on_error: Arc<RwLock<Option<ErrorHook<T>>>>,
    debug: Arc<AtomicBool>,
) -> GateFn<ActionContext<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Arc::new(move |ctx: ActionContext<T>| {
        let action_id = action_id.clone();
        let execute = Arc::clone(&execute);
        let on_error = Arc::clone(&on_error);
        let debug = Arc::clone(&debug);

        Box::pin(async move {
            if debug.load(Ordering::SeqCst) {
                debug!(action_id = %action_id, "action started");
            }

            match (execute)(ctx.clone()).await {
                Ok(()) => {
                    if debug.load(Ordering::SeqCst) {
                        debug!(action_id = %action_id, "action completed");
                    }
                }
                Err(source) => {
                    let error = EngineError::ActionFailed {
                        action_id: action_id.clone(),
                        source,
                    };
                    warn!(action_id = %action_id, error = %error, "action execute failed");
                    if let Some(hook) = on_error.read().await.as_ref() {
                        (hook)(&error, &ctx);
                    }
                }
            }
        })
    })
}

/// Build the dispatcher for an action from its rate policy.
///
/// With both policies set, debounce wraps throttle (see [`crate::rate_limit`]).
fn build_invoker<T>(action: &Action<T>, gate: GateFn<ActionContext<T>>) -> Invoker<T>
where
    T: Clone + Send + Sync + 'static,
{
    match (action.debounce, action.throttle) {
        (None, None) => Invoker::Direct(gate),
        (None, Some(limit)) => Invoker::Throttled(Throttler::new(limit, gate)),
        (Some(delay), None) => Invoker::Debounced(Debouncer::new(delay, gate)),
        (Some(delay), Some(limit)) => {
            let throttler = Arc::new(Throttler::new(limit, gate));
            let inner: GateFn<ActionContext<T>> = Arc::new(move |ctx| {
                let throttler = Arc::clone(&throttler);
                Box::pin(async move { throttler.call(ctx).await })
            });
            Invoker::Debounced(Debouncer::new(delay, inner))
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Reactive state-to-action engine.
///
/// Configure once with an initial snapshot, a provider registry, and a set
/// of actions; push every subsequent snapshot through [`Engine::update_state`].
/// After [`Engine::destroy`] the engine is permanently unusable.
pub struct Engine<T> {
    inner: Arc<EngineInner<T>>,
}

impl<T> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Engine<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Engine<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an unconfigured engine.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                snapshot: RwLock::new(Snapshot {
                    current: None,
                    previous: None,
                }),
                actions: DashMap::new(),
                in_flight: DashSet::new(),
                providers: RwLock::new(Arc::new(ProviderRegistry::new())),
                on_error: Arc::new(RwLock::new(None)),
                debug: Arc::new(AtomicBool::new(false)),
                configured: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Configure the engine: initial state, providers, actions, error hook.
    ///
    /// Calling `configure` again replaces the previous configuration
    /// wholesale (fresh action set, fresh tracker).  Fails with
    /// [`EngineError::Destroyed`] after [`Engine::destroy`].
    pub async fn configure(&self, config: EngineConfig<T>) -> Result<()> {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(EngineError::Destroyed);
        }

        self.inner.debug.store(config.debug, Ordering::SeqCst);
        *self.inner.on_error.write().await = config.on_error;
        *self.inner.providers.write().await = config.providers;

        {
            let mut snapshot = self.inner.snapshot.write().await;
            snapshot.current = Some(config.initial_state);
            snapshot.previous = None;
        }

        self.inner.actions.clear();
        self.inner.in_flight.clear();

        let count = config.actions.len();
        for action in config.actions {
            self.add_action(action)?;
        }

        self.inner.configured.store(true, Ordering::SeqCst);
        if config.debug {
            debug!(actions = count, "engine configured");
        }
        Ok(())
    }

    /// Push a new snapshot of the watched state.
    ///
    /// Every registered action is evaluated against the transition from the
    /// previous snapshot; evaluations run concurrently and this call
    /// resolves once all of them have settled.  One action's failure never
    /// aborts the others.  The engine performs no deduplication: every call
    /// is treated as a transition, even when the value is unchanged.
    ///
    /// Silent no-op when the engine is destroyed or unconfigured.
    pub async fn update_state(&self, new_state: T) {
        if self.inner.destroyed.load(Ordering::SeqCst)
            || !self.inner.configured.load(Ordering::SeqCst)
        {
            return;
        }

        let timestamp = Utc::now();
        let previous = {
            let mut snapshot = self.inner.snapshot.write().await;
            snapshot.previous = snapshot.current.replace(new_state.clone());
            snapshot.previous.clone()
        };

        let Some(previous) = previous else {
            // First snapshot; there is no transition to evaluate yet.
            return;
        };

        let providers = Arc::clone(&*self.inner.providers.read().await);
        let registered: Vec<Arc<RegisteredAction<T>>> = self
            .inner
            .actions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        if self.inner.debug.load(Ordering::SeqCst) {
            debug!(actions = registered.len(), "state updated, evaluating actions");
        }

        let inner = &self.inner;
        let evaluations = registered.into_iter().map(|reg| {
            let previous = previous.clone();
            let current = new_state.clone();
            let providers = Arc::clone(&providers);
            async move {
                Self::process_action(inner, reg, previous, current, timestamp, providers).await;
            }
        });

        futures::future::join_all(evaluations).await;
    }

    /// Evaluate and, when everything passes, run a single action for one
    /// state transition.
    async fn process_action(
        inner: &EngineInner<T>,
        reg: Arc<RegisteredAction<T>>,
        previous: T,
        current: T,
        timestamp: DateTime<Utc>,
        providers: Arc<ProviderRegistry>,
    ) {
        let action = &reg.action;
        let meta = TriggerMeta { timestamp };

        if !(action.trigger)(&previous, &current, &meta) {
            return;
        }

        let ctx = ActionContext {
            state: current,
            providers,
            meta: ActionMeta {
                trigger_id: action.id.clone(),
                timestamp,
                previous,
            },
        };

        let debug_enabled = inner.debug.load(Ordering::SeqCst);
        for (index, condition) in action.conditions.iter().enumerate() {
            if !condition(&ctx) {
                if debug_enabled {
                    debug!(action_id = %action.id, condition = index, "condition failed, skipping");
                }
                return;
            }
        }

        if action.prevent_reentry && inner.in_flight.contains(&action.id) {
            if debug_enabled {
                debug!(action_id = %action.id, "already running, re-entry prevented");
            }
            return;
        }

        // For debounced actions the in-flight entry brackets only the
        // scheduling of the delayed run, so the guard is best-effort there.
        inner.in_flight.insert(action.id.clone());
        match &reg.invoker {
            Invoker::Direct(gate) => gate(ctx).await,
            Invoker::Throttled(throttler) => throttler.call(ctx).await,
            Invoker::Debounced(debouncer) => debouncer.call(ctx).await,
        }
        inner.in_flight.remove(&action.id);
    }

    /// Register an action, replacing any existing action with the same id.
    ///
    /// The execute callback is wrapped with the action's debounce/throttle
    /// policy at registration time.
    pub fn add_action(&self, action: Action<T>) -> Result<()> {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(EngineError::Destroyed);
        }

        let gate = wrap_execute(
            action.id.clone(),
            Arc::clone(&action.execute),
            Arc::clone(&self.inner.on_error),
            Arc::clone(&self.inner.debug),
        );
        let invoker = build_invoker(&action, gate);

        let id = action.id.clone();
        let replaced = self
            .inner
            .actions
            .insert(id.clone(), Arc::new(RegisteredAction { action, invoker }))
            .is_some();

        if self.inner.debug.load(Ordering::SeqCst) {
            debug!(action_id = %id, replaced, "action registered");
        }
        Ok(())
    }

    /// Remove an action by id.  Silent no-op when absent.
    pub fn remove_action(&self, action_id: &str) {
        if self.inner.actions.remove(action_id).is_some()
            && self.inner.debug.load(Ordering::SeqCst)
        {
            debug!(action_id = %action_id, "action removed");
        }
    }

    /// Reconcile the registered action set against a new list: actions with
    /// ids missing from the list are removed, every supplied action is
    /// (re-)registered.  The snapshot pair and the in-flight tracker are
    /// untouched, so unrelated engine state survives an action-list change.
    pub fn reconcile_actions(&self, actions: Vec<Action<T>>) -> Result<()> {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(EngineError::Destroyed);
        }

        let keep: HashSet<String> = actions.iter().map(|a| a.id.clone()).collect();
        self.inner.actions.retain(|id, _| keep.contains(id));

        for action in actions {
            self.add_action(action)?;
        }

        if self.inner.debug.load(Ordering::SeqCst) {
            debug!(actions = self.inner.actions.len(), "action set reconciled");
        }
        Ok(())
    }

    /// Destroy the engine: drop all actions, the tracker, the providers,
    /// and the snapshots, and refuse any further configuration.  Idempotent.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.actions.clear();
        self.inner.in_flight.clear();
        *self.inner.providers.write().await = Arc::new(ProviderRegistry::new());
        *self.inner.on_error.write().await = None;
        {
            let mut snapshot = self.inner.snapshot.write().await;
            snapshot.current = None;
            snapshot.previous = None;
        }
        self.inner.configured.store(false, Ordering::SeqCst);

        if self.inner.debug.load(Ordering::SeqCst) {
            debug!("engine destroyed");
        }
    }

    // -- Introspection -------------------------------------------------------

    /// The current snapshot, if configured.
    pub async fn current_state(&self) -> Option<T> {
        self.inner.snapshot.read().await.current.clone()
    }

    /// The snapshot before the most recent update, if any.
    pub async fn previous_state(&self) -> Option<T> {
        self.inner.snapshot.read().await.previous.clone()
    }

    /// Whether the given action currently has an in-flight execution.
    pub fn is_running(&self, action_id: &str) -> bool {
        self.inner.in_flight.contains(action_id)
    }

    /// Ids of all actions with an in-flight execution.
    pub fn running_actions(&self) -> Vec<String> {
        self.inner
            .in_flight
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// The number of registered actions.
    pub fn action_count(&self) -> usize {
        self.inner.actions.len()
    }

    /// Whether [`Engine::configure`] has completed and the engine is live.
    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::SeqCst)
    }

    /// Whether [`Engine::destroy`] has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
