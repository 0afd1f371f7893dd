//! The bee capability set and the factory contract.
//!
//! A [`BeeFactory`] describes one kind of integration and builds instances
//! of it. An instance implements [`Bee`]: a long-running [`Bee::run`] loop
//! that publishes events, and an [`Bee::action`] handler that executes
//! commands. Lifecycle, timestamps and retries are owned by the hive, not by
//! the bee.
//!
//! # Example
//!
//! ```rust,ignore
//! struct EchoBee;
//!
//! #[async_trait]
//! impl Bee for EchoBee {
//!     async fn action(&self, action: &Action) -> BeeResult<Placeholders> {
//!         match action.name.as_str() {
//!             "say" => {
//!                 let text: String = action.options.bind("text")?;
//!                 println!("{text}");
//!                 Ok(Placeholders::new())
//!             }
//!             other => Err(BeeError::UnknownAction(other.to_string())),
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::action::Action;
use crate::bus::EventSink;
use crate::context::ContextStore;
use crate::descriptor::{ActionDescriptor, BeeOptionDescriptor, EventDescriptor};
use crate::error::BeeResult;
use crate::event::Event;
use crate::logs::{LogStore, Severity};
use crate::placeholder::{BeeOptions, Placeholders};
use crate::value::Value;

/// Configuration identifying which factory to instantiate and how.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeeConfig {
    /// Unique instance name.
    pub name: String,
    /// Id of the factory to instantiate.
    pub class: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: BeeOptions,
}

impl BeeConfig {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options = self.options.with(name, value);
        self
    }
}

/// A running integration.
#[async_trait]
pub trait Bee: Send + Sync + 'static {
    /// The worker loop. It should publish through `ctx` and return once
    /// `ctx` is cancelled. Returning an error or panicking is a fault that
    /// the supervisor retries.
    ///
    /// The default waits for cancellation, which suits bees that only
    /// react to actions.
    async fn run(&self, ctx: RunContext) -> BeeResult<()> {
        ctx.cancelled().await;
        Ok(())
    }

    /// Executes an action addressed to this bee and returns its outputs.
    async fn action(&self, action: &Action) -> BeeResult<Placeholders>;

    /// Called after the bee's options were replaced.
    fn reload_options(&self, _options: &BeeOptions) -> BeeResult<()> {
        Ok(())
    }
}

/// Describes and constructs one class of bees.
pub trait BeeFactory: Send + Sync + 'static {
    /// Class id, referenced by [`BeeConfig::class`].
    fn id(&self) -> &str;

    /// Human readable name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn image(&self) -> String {
        format!("{}.png", self.id())
    }

    fn logo_color(&self) -> &str {
        "#000000"
    }

    fn options(&self) -> Vec<BeeOptionDescriptor> {
        Vec::new()
    }

    fn events(&self) -> Vec<EventDescriptor> {
        Vec::new()
    }

    fn actions(&self) -> Vec<ActionDescriptor> {
        Vec::new()
    }

    /// Builds a new instance. `scope` gives the instance its log and
    /// context handles.
    fn create(&self, config: &BeeConfig, scope: BeeScope) -> BeeResult<Arc<dyn Bee>>;
}

/// Per-instance handle to the shared log and context stores.
#[derive(Clone)]
pub struct BeeScope {
    name: Arc<str>,
    logs: Arc<LogStore>,
    context: Arc<ContextStore>,
}

impl BeeScope {
    pub fn new(name: &str, logs: Arc<LogStore>, context: Arc<ContextStore>) -> Self {
        Self {
            name: Arc::from(name),
            logs,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(bee = %self.name, "{message}");
        self.logs.log(&self.name, message, Severity::Info);
    }

    pub fn log_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(bee = %self.name, "{message}");
        self.logs.log(&self.name, message, Severity::Error);
    }

    pub fn log_fatal(&self, message: impl Into<String>) {
        let message = message.into();
        error!(bee = %self.name, fatal = true, "{message}");
        self.logs.log(&self.name, message, Severity::Fatal);
    }

    pub fn context_set(&self, key: &str, value: impl Into<Value>) {
        self.context.set(&self.name, key, value);
    }

    pub fn context_value(&self, key: &str) -> Option<Value> {
        self.context.value(&self.name, key)
    }
}

/// Everything a bee's worker loop gets for one launch.
#[derive(Clone)]
pub struct RunContext {
    scope: BeeScope,
    events: EventSink,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(scope: BeeScope, events: EventSink, cancel: CancellationToken) -> Self {
        Self {
            scope,
            events,
            cancel,
        }
    }

    pub fn scope(&self) -> &BeeScope {
        &self.scope
    }

    /// Starts an event sourced from this bee.
    pub fn event(&self, name: impl Into<String>) -> Event {
        Event::new(self.scope.name(), name)
    }

    /// Publishes an event, waiting until the dispatcher accepts it.
    pub async fn emit(&self, event: Event) -> BeeResult<()> {
        self.events.send(event).await
    }

    /// Resolves once the bee is asked to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
