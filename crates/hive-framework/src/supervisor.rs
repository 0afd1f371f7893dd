//! Supervised bee instances.
//!
//! A [`BeeHandle`] owns one bee instance and runs exactly one worker task
//! for it. The worker is relaunched when [`Bee::run`] fails or panics, at
//! most [`MAX_RESTARTS`] times and after a pause of [`RESTART_DELAY`];
//! after that the instance is parked in [`BeeState::Faulted`] until it is
//! explicitly restarted.
//!
//! ```text
//! Created ──start()──▶ Running ──stop()──▶ Stopping ──▶ Stopped
//!                        │  ▲
//!                  fault │  │ relaunch
//!                        ▼  │
//!                     Restarting ──(retries exhausted)──▶ Faulted
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hive_core::{
    Action, Bee, BeeConfig, BeeOptions, BeeResult, BeeScope, EventSink, Placeholders, RunContext,
};

use crate::error::panic_message;

/// Number of relaunches after a worker fault before giving up.
pub const MAX_RESTARTS: u32 = 3;

/// Default pause before a faulted worker is relaunched.
pub const RESTART_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle state of a supervised bee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BeeState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// Retries were exhausted; the worker is not relaunched.
    Faulted,
    /// A fault was trapped and the worker is about to be relaunched.
    Restarting,
}

impl BeeState {
    /// Whether a worker task may currently be alive.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Restarting)
    }
}

impl fmt::Display for BeeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Faulted => "Faulted",
            Self::Restarting => "Restarting",
        };
        f.write_str(s)
    }
}

/// A bee instance together with its supervision state.
pub struct BeeHandle {
    namespace: String,
    config: RwLock<BeeConfig>,
    bee: Arc<dyn Bee>,
    scope: BeeScope,
    state: Mutex<BeeState>,
    retries: AtomicU32,
    restart_delay: Duration,
    /// Replaced, never reset, when a stopped bee is started again.
    cancel: Mutex<CancellationToken>,
    worker: AsyncMutex<Option<JoinHandle<()>>>,
    /// Serializes action calls into the instance.
    action_lock: AsyncMutex<()>,
    last_event: Mutex<Option<DateTime<Utc>>>,
    last_action: Mutex<Option<DateTime<Utc>>>,
}

impl BeeHandle {
    /// Wraps a freshly created bee. `namespace` is the id of its factory.
    pub fn new(
        namespace: impl Into<String>,
        config: BeeConfig,
        bee: Arc<dyn Bee>,
        scope: BeeScope,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            config: RwLock::new(config),
            bee,
            scope,
            state: Mutex::new(BeeState::Created),
            retries: AtomicU32::new(0),
            restart_delay: RESTART_DELAY,
            cancel: Mutex::new(CancellationToken::new()),
            worker: AsyncMutex::new(None),
            action_lock: AsyncMutex::new(()),
            last_event: Mutex::new(None),
            last_action: Mutex::new(None),
        }
    }

    /// Sets the pause between a worker fault and its relaunch.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        self.scope.name()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn description(&self) -> String {
        self.config.read().description.clone()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        self.config.write().description = description.into();
    }

    /// Returns a copy of the instance configuration.
    pub fn config(&self) -> BeeConfig {
        self.config.read().clone()
    }

    pub fn options(&self) -> BeeOptions {
        self.config.read().options.clone()
    }

    /// Hands new options to the bee and stores them if it accepts them.
    pub fn set_options(&self, options: BeeOptions) -> BeeResult<()> {
        self.bee.reload_options(&options)?;
        self.config.write().options = options;
        Ok(())
    }

    pub fn scope(&self) -> &BeeScope {
        &self.scope
    }

    pub fn state(&self) -> BeeState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// Relaunches since the last explicit start or restart.
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        *self.last_event.lock()
    }

    /// Records that the bee just published an event.
    pub fn log_event(&self) {
        *self.last_event.lock() = Some(Utc::now());
    }

    pub fn last_action(&self) -> Option<DateTime<Utc>> {
        *self.last_action.lock()
    }

    /// Records that the bee just received an action.
    pub fn log_action(&self) {
        *self.last_action.lock() = Some(Utc::now());
    }

    fn set_state(&self, state: BeeState) {
        let old = std::mem::replace(&mut *self.state.lock(), state);
        if old != state {
            debug!(bee = %self.name(), old_state = %old, new_state = %state, "Bee state changed");
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Launches the worker task. Does nothing if it is already running.
    pub async fn start(self: &Arc<Self>, events: EventSink) {
        let mut worker = self.worker.lock().await;
        if self.is_running() {
            return;
        }

        let token = {
            let mut cancel = self.cancel.lock();
            if cancel.is_cancelled() {
                *cancel = CancellationToken::new();
            }
            cancel.clone()
        };

        self.set_state(BeeState::Starting);
        info!(bee = %self.name(), namespace = %self.namespace, "Starting bee");

        self.set_state(BeeState::Running);

        let handle = Arc::clone(self);
        *worker = Some(tokio::spawn(async move {
            handle.supervise(events, token).await;
        }));
    }

    /// Cancels the worker and waits until it has exited, including any
    /// relaunch in flight. Calling it on a bee that is not running is a
    /// no-op.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        {
            let mut state = self.state.lock();
            if !state.is_active() {
                return;
            }
            *state = BeeState::Stopping;
        }
        info!(bee = %self.name(), "Stopping bee");

        let token = self.cancel.lock().clone();
        if !token.is_cancelled() {
            token.cancel();
        }

        if let Some(task) = worker.take()
            && let Err(e) = task.await
        {
            error!(bee = %self.name(), error = %e, "Bee worker task failed to join");
        }

        self.set_state(BeeState::Stopped);
        info!(bee = %self.name(), "Bee stopped");
    }

    /// Stops the bee, then starts it again with a fresh cancellation token
    /// and the retry counter cleared.
    pub async fn restart(self: &Arc<Self>, events: EventSink) {
        self.stop().await;
        *self.cancel.lock() = CancellationToken::new();
        self.retries.store(0, Ordering::SeqCst);
        self.start(events).await;
    }

    async fn supervise(self: Arc<Self>, events: EventSink, token: CancellationToken) {
        loop {
            let ctx = RunContext::new(self.scope.clone(), events.clone(), token.clone());
            let fault = match AssertUnwindSafe(self.bee.run(ctx)).catch_unwind().await {
                Ok(Ok(())) => {
                    debug!(bee = %self.name(), "Bee worker returned");
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panic: {}", panic_message(panic.as_ref())),
            };

            if token.is_cancelled() {
                debug!(bee = %self.name(), fault = %fault, "Bee worker faulted while stopping");
                return;
            }

            let retries = self.retries.load(Ordering::SeqCst);
            self.scope
                .log_error(format!("Bee worker faulted (retry {retries}): {fault}"));

            if retries >= MAX_RESTARTS {
                self.set_state(BeeState::Faulted);
                token.cancel();
                self.scope.log_fatal(format!(
                    "Giving up on bee after {retries} restarts, it stays stopped"
                ));
                return;
            }

            self.retries.fetch_add(1, Ordering::SeqCst);
            self.set_state(BeeState::Restarting);
            warn!(
                bee = %self.name(),
                attempt = retries + 1,
                delay_ms = self.restart_delay.as_millis() as u64,
                "Relaunching bee worker"
            );
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(bee = %self.name(), "Bee stopped before relaunch");
                    return;
                }
                _ = tokio::time::sleep(self.restart_delay) => {}
            }
            self.set_state(BeeState::Running);
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Runs `action` on the bee. Calls into the same instance never overlap.
    pub async fn execute(&self, action: &Action) -> BeeResult<Placeholders> {
        let _guard = self.action_lock.lock().await;
        self.log_action();
        self.bee.action(action).await
    }
}

impl fmt::Debug for BeeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeeHandle")
            .field("name", &self.name())
            .field("namespace", &self.namespace)
            .field("state", &self.state())
            .field("retries", &self.retries())
            .finish()
    }
}
