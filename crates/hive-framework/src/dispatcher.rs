//! The event dispatcher.
//!
//! A single long-lived task drains the [`EventReceiver`]. For every event it
//! stamps the source bee, logs the event, and hands it to the
//! [`ChainEngine`] on a task of its own so that slow chains never hold up
//! the bus. The loop ends once the bus is closed and drained.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, debug, error, info, span, warn};

use hive_core::{Event, EventReceiver};

use crate::engine::ChainEngine;
use crate::error::panic_message;
use crate::registry::{BeeRegistry, FactoryRegistry};

/// Longest option value written to the event log, in characters.
pub const MAX_LOGGED_VALUE: usize = 1000;

/// Routes events from the bus into the chain engine.
#[derive(Clone)]
pub struct EventDispatcher {
    bees: Arc<BeeRegistry>,
    factories: Arc<FactoryRegistry>,
    engine: Arc<ChainEngine>,
}

impl EventDispatcher {
    pub fn new(
        bees: Arc<BeeRegistry>,
        factories: Arc<FactoryRegistry>,
        engine: Arc<ChainEngine>,
    ) -> Self {
        Self {
            bees,
            factories,
            engine,
        }
    }

    /// Runs the dispatch loop on its own task.
    pub fn spawn(self, rx: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Dispatches events until the bus is closed.
    pub async fn run(self, mut rx: EventReceiver) {
        debug!("Event dispatcher started");
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
        }
        info!("Event bus closed, dispatcher exiting");
    }

    /// Records `event` and processes it on a new task.
    pub fn dispatch(&self, event: Event) -> JoinHandle<()> {
        self.record(&event);

        let engine = Arc::clone(&self.engine);
        let span = span!(Level::DEBUG, "event", bee = %event.bee, name = %event.name);
        tokio::spawn(
            async move {
                if let Err(panic) = AssertUnwindSafe(engine.process(&event)).catch_unwind().await {
                    error!(
                        event = %event,
                        "Event processing panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
            .instrument(span),
        )
    }

    fn record(&self, event: &Event) {
        let Some(source) = self.bees.get(&event.bee) else {
            warn!(bee = %event.bee, event = %event.name, "Event from unknown bee");
            return;
        };
        source.log_event();

        let description = self
            .factories
            .get(source.namespace())
            .and_then(|factory| {
                factory
                    .events()
                    .into_iter()
                    .find(|d| d.name == event.name)
                    .map(|d| d.description)
            })
            .unwrap_or_default();

        info!(bee = %event.bee, event = %event.name, "Event received: {description}");
        for option in &event.options {
            debug!(
                bee = %event.bee,
                event = %event.name,
                option = %option.name,
                "{}",
                truncate_string(&option.value.to_string(), MAX_LOGGED_VALUE)
            );
        }
    }
}

/// Cuts `s` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_string(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}
