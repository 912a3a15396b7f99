//! Inactivity detection layered on top of the engine.
//!
//! The watcher is deliberately external to the engine core: it only
//! observes activity via [`IdleWatcher::touch`] and emits [`IdleEvent`]s
//! through a tokio channel once a quiet period elapses.  Wiring an idle
//! event back into an action (or a synthesized `update_state` call) is the
//! caller's choice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};

/// Event emitted when no activity has been observed for the configured
/// timeout.
#[derive(Debug, Clone)]
pub struct IdleEvent {
    /// How long the watcher had seen no activity when it fired.
    pub idle_for: Duration,
    /// UTC timestamp when the event was fired.
    pub fired_at: DateTime<Utc>,
}

/// Background inactivity watcher.
///
/// Call [`IdleWatcher::touch`] on every observed state update.  After
/// `timeout` with no touch, one [`IdleEvent`] is emitted; the watcher then
/// stays quiet until the next touch re-arms it.
pub struct IdleWatcher {
    timeout: Duration,
    last_activity: Arc<RwLock<Instant>>,
    /// Whether the current quiet period has already produced an event.
    fired: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl IdleWatcher {
    /// Create a watcher that considers the world idle after `timeout`
    /// without a touch.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_activity: Arc::new(RwLock::new(Instant::now())),
            fired: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Record activity, re-arming the watcher.
    pub async fn touch(&self) {
        *self.last_activity.write().await = Instant::now();
        self.fired.store(false, Ordering::SeqCst);
    }

    /// Start the background loop.
    ///
    /// The loop polls at a fraction of the timeout and sends one
    /// [`IdleEvent`] through `event_tx` per quiet period.
    pub fn start(&mut self, event_tx: mpsc::UnboundedSender<IdleEvent>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::WatcherAlreadyRunning);
        }

        let running = Arc::clone(&self.running);
        let last_activity = Arc::clone(&self.last_activity);
        let fired = Arc::clone(&self.fired);
        let timeout = self.timeout;
        let poll = (timeout / 4).max(Duration::from_millis(10));

        let handle = tokio::spawn(async move {
            info!(timeout_ms = timeout.as_millis() as u64, "idle watcher started");

            while running.load(Ordering::SeqCst) {
                let idle_for = last_activity.read().await.elapsed();

                if idle_for >= timeout && !fired.swap(true, Ordering::SeqCst) {
                    let event = IdleEvent {
                        idle_for,
                        fired_at: Utc::now(),
                    };
                    debug!(idle_ms = idle_for.as_millis() as u64, "idle period detected");

                    if let Err(e) = event_tx.send(event) {
                        error!(error = %e, "failed to send idle event");
                    }
                }

                tokio::time::sleep(poll).await;
            }

            info!("idle watcher stopped");
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the background loop and wait for it to finish.
    pub async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("stop called but idle watcher is not running");
            return;
        }

        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "idle watcher task panicked during shutdown");
        }
    }

    /// Whether the background loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_after_quiet_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = IdleWatcher::new(Duration::from_millis(50));
        watcher.start(tx).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for idle event")
            .expect("channel closed unexpectedly");

        watcher.stop().await;
        assert!(event.idle_for >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn fires_once_per_quiet_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = IdleWatcher::new(Duration::from_millis(30));
        watcher.start(tx).unwrap();

        // Let it go idle and then some; only one event may arrive.
        tokio::time::sleep(Duration::from_millis(300)).await;
        watcher.stop().await;

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn touch_rearms_the_watcher() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = IdleWatcher::new(Duration::from_millis(40));
        watcher.start(tx).unwrap();

        // First quiet period.
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for first idle event");
        assert!(first.is_some());

        // Re-arm and wait out a second quiet period.
        watcher.touch().await;
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for second idle event");
        assert!(second.is_some());

        watcher.stop().await;
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let mut watcher = IdleWatcher::new(Duration::from_millis(100));

        watcher.start(tx).unwrap();
        assert!(matches!(
            watcher.start(tx2),
            Err(EngineError::WatcherAlreadyRunning)
        ));
        watcher.stop().await;
    }

    #[tokio::test]
    async fn stop_when_not_running_is_harmless() {
        let mut watcher = IdleWatcher::new(Duration::from_millis(100));
        assert!(!watcher.is_running());
        watcher.stop().await;
    }
}
