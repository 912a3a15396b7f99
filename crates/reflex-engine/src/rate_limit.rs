//! Reusable rate-limiting wrappers: debounce and throttle.
//!
//! Both wrap an async callback and are generic over the payload they carry,
//! so the engine can feed action contexts through them, but nothing here is
//! action-specific.
//!
//! When an action configures both policies, debounce wraps throttle: rapid
//! calls keep resetting the quiet-period timer, and once the debounce fires,
//! the throttler applies its cooldown to subsequent firings.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// The async callback a rate limiter wraps.
pub type GateFn<P> = Arc<dyn Fn(P) -> BoxFuture<'static, ()> + Send + Sync>;

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

struct DebounceState<P> {
    /// Incremented on every call; a timer task only fires if its generation
    /// is still current when it wakes.
    generation: u64,
    /// Payload of the most recent call within the quiet window.
    payload: Option<P>,
}

/// Delay-until-quiet wrapper.
///
/// Every [`Debouncer::call`] stores its payload and resets the quiet-period
/// timer.  The wrapped callback runs once no further call lands for
/// `delay`, with the payload of the last call in the window.
pub struct Debouncer<P> {
    delay: Duration,
    func: GateFn<P>,
    state: Arc<Mutex<DebounceState<P>>>,
}

impl<P: Send + 'static> Debouncer<P> {
    /// Wrap `func` with a quiet period of `delay`.
    pub fn new(delay: Duration, func: GateFn<P>) -> Self {
        Self {
            delay,
            func,
            state: Arc::new(Mutex::new(DebounceState {
                generation: 0,
                payload: None,
            })),
        }
    }

    /// Record a call and (re)start the quiet-period timer.
    ///
    /// Resolves as soon as the timer is scheduled; the wrapped callback
    /// runs later on its own task.
    pub async fn call(&self, payload: P) {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation = state.generation.wrapping_add(1);
            state.payload = Some(payload);
            state.generation
        };

        let state = Arc::clone(&self.state);
        let func = Arc::clone(&self.func);
        let delay = self.delay;

        tokio::spawn(async move {
            sleep(delay).await;

            let payload = {
                let mut state = state.lock().await;
                if state.generation != generation {
                    // A newer call reset the timer; this one is stale.
                    return;
                }
                state.payload.take()
            };

            if let Some(payload) = payload {
                (func)(payload).await;
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Fixed-cooldown wrapper.
///
/// The first [`Throttler::call`] runs the wrapped callback immediately and
/// starts a cooldown of `limit`.  Calls arriving during the cooldown are
/// dropped, not queued.
pub struct Throttler<P> {
    limit: Duration,
    func: GateFn<P>,
    last_fired: Mutex<Option<Instant>>,
}

impl<P: Send + 'static> Throttler<P> {
    /// Wrap `func` with a cooldown of `limit`.
    pub fn new(limit: Duration, func: GateFn<P>) -> Self {
        Self {
            limit,
            func,
            last_fired: Mutex::new(None),
        }
    }

    /// Run the wrapped callback unless the cooldown is still active.
    pub async fn call(&self, payload: P) {
        {
            let mut last = self.last_fired.lock().await;
            if let Some(at) = *last {
                if at.elapsed() < self.limit {
                    return;
                }
            }
            *last = Some(Instant::now());
        }

        (self.func)(payload).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_gate() -> (GateFn<i32>, Arc<AtomicUsize>, Arc<StdMutex<Vec<i32>>>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let gate: GateFn<i32> = {
            let count = Arc::clone(&count);
            let seen = Arc::clone(&seen);
            Arc::new(move |payload| {
                let count = Arc::clone(&count);
                let seen = Arc::clone(&seen);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    seen.lock().unwrap().push(payload);
                })
            })
        };

        (gate, count, seen)
    }

    #[tokio::test]
    async fn debounce_collapses_burst_to_last_call() {
        let (gate, count, seen) = recording_gate();
        let debouncer = Debouncer::new(Duration::from_millis(100), gate);

        for i in 1..=5 {
            debouncer.call(i).await;
        }

        sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn debounce_fires_again_after_quiet_period() {
        let (gate, count, _seen) = recording_gate();
        let debouncer = Debouncer::new(Duration::from_millis(50), gate);

        debouncer.call(1).await;
        sleep(Duration::from_millis(250)).await;
        debouncer.call(2).await;
        sleep(Duration::from_millis(250)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn throttle_runs_first_call_and_drops_burst() {
        let (gate, count, seen) = recording_gate();
        let throttler = Throttler::new(Duration::from_millis(150), gate);

        for i in 1..=5 {
            throttler.call(i).await;
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn throttle_allows_call_after_cooldown() {
        let (gate, count, _seen) = recording_gate();
        let throttler = Throttler::new(Duration::from_millis(100), gate);

        for i in 1..=5 {
            throttler.call(i).await;
        }
        sleep(Duration::from_millis(300)).await;
        throttler.call(6).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn debounce_wrapping_throttle_fires_once_per_quiet_window() {
        let (gate, count, seen) = recording_gate();
        let throttler = Arc::new(Throttler::new(Duration::from_millis(100), gate));

        let inner: GateFn<i32> = {
            let throttler = Arc::clone(&throttler);
            Arc::new(move |payload| {
                let throttler = Arc::clone(&throttler);
                Box::pin(async move { throttler.call(payload).await })
            })
        };
        let debouncer = Debouncer::new(Duration::from_millis(50), inner);

        for i in 1..=3 {
            debouncer.call(i).await;
        }
        sleep(Duration::from_millis(300)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }
}
