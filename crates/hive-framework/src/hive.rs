//! The [`Hive`]: registries, bus, dispatcher and chain engine in one place.
//!
//! `Hive` is the only entry point administration code needs. It owns the
//! lifecycle of every bee, the event bus and its dispatcher task, and the
//! chain and action tables.
//!
//! # Example
//!
//! ```rust,ignore
//! let hive = Hive::new();
//! hive.register_factory(Arc::new(TickerFactory))?;
//! hive.set_actions(manifest.actions);
//! hive.set_chains(manifest.chains);
//! hive.start_all(&manifest.bees).await;
//! // ...later...
//! hive.stop_all().await;
//! ```

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use hive_core::{
    Action, ActionDescriptor, BeeConfig, BeeFactory, BeeScope, Chain, ContextStore, Event,
    EventBus, EventDescriptor, EventSink, HiveManifest, LogMessage, LogStore, ValueMap,
    complete_options,
};

use crate::dispatcher::EventDispatcher;
use crate::engine::ChainEngine;
use crate::error::{HiveError, HiveResult};
use crate::filter::{FilterEvaluator, FilterRegistry};
use crate::registry::{BeeRegistry, FactoryRegistry, RegistryStats};
use crate::supervisor::BeeHandle;

/// The bus and the task draining it.
struct ActiveBus {
    bus: Arc<EventBus>,
    dispatcher: JoinHandle<()>,
}

/// The event-driven automation hub.
pub struct Hive {
    factories: Arc<FactoryRegistry>,
    bees: Arc<BeeRegistry>,
    filters: Arc<FilterRegistry>,
    engine: Arc<ChainEngine>,
    logs: Arc<LogStore>,
    context: Arc<ContextStore>,
    bus: Mutex<Option<ActiveBus>>,
}

impl Hive {
    pub fn new() -> Self {
        Self::with_log_store(Arc::new(LogStore::new()))
    }

    /// Creates a hive keeping at most `capacity` log messages per bee.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self::with_log_store(Arc::new(LogStore::with_capacity(capacity)))
    }

    fn with_log_store(logs: Arc<LogStore>) -> Self {
        let bees = Arc::new(BeeRegistry::new());
        let filters = Arc::new(FilterRegistry::with_defaults());
        let engine = Arc::new(ChainEngine::new(
            Arc::clone(&bees),
            Arc::clone(&filters),
            Arc::clone(&logs),
        ));
        Self {
            factories: Arc::new(FactoryRegistry::new()),
            bees,
            filters,
            engine,
            logs,
            context: Arc::new(ContextStore::new()),
            bus: Mutex::new(None),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn register_factory(&self, factory: Arc<dyn BeeFactory>) -> HiveResult<()> {
        self.factories.register(factory)
    }

    /// Installs a filter evaluator, e.g. a script runtime under
    /// [`SCRIPT_EVALUATOR`](crate::filter::SCRIPT_EVALUATOR).
    pub fn register_filter(&self, evaluator: Arc<dyn FilterEvaluator>) {
        self.filters.register(evaluator);
    }

    // =========================================================================
    // Event bus
    // =========================================================================

    /// Returns a publishing handle, creating the bus and its dispatcher on
    /// first use.
    pub fn sink(&self) -> EventSink {
        let mut active = self.bus.lock();
        if let Some(active) = active.as_ref() {
            return active.bus.sink();
        }

        let (bus, rx) = EventBus::new();
        let dispatcher = EventDispatcher::new(
            Arc::clone(&self.bees),
            Arc::clone(&self.factories),
            Arc::clone(&self.engine),
        )
        .spawn(rx);
        let sink = bus.sink();
        *active = Some(ActiveBus { bus, dispatcher });
        info!("Event bus opened");
        sink
    }

    async fn close_bus(&self) {
        let active = self.bus.lock().take();
        let Some(active) = active else {
            return;
        };
        active.bus.close();
        if let Err(e) = active.dispatcher.await {
            error!(error = %e, "Event dispatcher task failed");
        }
        info!("Event bus closed");
    }

    // =========================================================================
    // Bee lifecycle
    // =========================================================================

    /// Validates `config` and instantiates it into a registered, not yet
    /// running bee.
    pub fn new_bee(&self, config: &BeeConfig) -> HiveResult<Arc<BeeHandle>> {
        if config.name.is_empty() {
            return Err(HiveError::EmptyName);
        }
        if self.bees.contains(&config.name) {
            return Err(HiveError::NameTaken(config.name.clone()));
        }
        let factory = self
            .factories
            .get(&config.class)
            .ok_or_else(|| HiveError::UnknownClass(config.class.clone()))?;

        let options = complete_options(&factory.options(), &config.options).map_err(|option| {
            HiveError::MissingOption {
                bee: config.name.clone(),
                option,
            }
        })?;
        let config = BeeConfig {
            options,
            ..config.clone()
        };

        let scope = BeeScope::new(
            &config.name,
            Arc::clone(&self.logs),
            Arc::clone(&self.context),
        );
        let bee = factory.create(&config, scope.clone())?;
        let handle = Arc::new(BeeHandle::new(factory.id(), config, bee, scope));
        self.bees.register(Arc::clone(&handle))?;
        Ok(handle)
    }

    /// Creates a bee from `config` and starts it.
    pub async fn start_bee(&self, config: &BeeConfig) -> HiveResult<Arc<BeeHandle>> {
        let handle = self.new_bee(config)?;
        handle.start(self.sink()).await;
        Ok(handle)
    }

    /// Stops a bee and removes it, together with its context entries.
    pub async fn stop_bee(&self, name: &str) -> HiveResult<()> {
        let handle = self
            .bees
            .remove(name)
            .ok_or_else(|| HiveError::BeeNotFound(name.to_string()))?;
        handle.stop().await;
        self.context.remove_bee(name);
        Ok(())
    }

    pub async fn restart_bee(&self, name: &str) -> HiveResult<Arc<BeeHandle>> {
        let handle = self
            .bees
            .get(name)
            .ok_or_else(|| HiveError::BeeNotFound(name.to_string()))?;
        handle.restart(self.sink()).await;
        Ok(handle)
    }

    /// Starts every configured bee. Failures are logged and skipped; the
    /// number of started bees is returned.
    pub async fn start_all(&self, configs: &[BeeConfig]) -> usize {
        let sink = self.sink();
        let mut started = 0;
        for config in configs {
            match self.new_bee(config) {
                Ok(handle) => {
                    handle.start(sink.clone()).await;
                    started += 1;
                }
                Err(e) => {
                    error!(bee = %config.name, class = %config.class, error = %e, "Failed to start bee");
                }
            }
        }
        info!(started, configured = configs.len(), "Bees started");
        started
    }

    /// Stops every bee, closes the bus and empties the bee registry.
    pub async fn stop_all(&self) {
        let handles = self.bees.list();
        info!("Stopping {} bee(s)", handles.len());
        join_all(handles.iter().map(|handle| handle.stop())).await;

        self.close_bus().await;

        for handle in self.bees.clear() {
            self.context.remove_bee(handle.name());
        }
    }

    pub async fn restart_all(&self, configs: &[BeeConfig]) -> usize {
        self.stop_all().await;
        self.start_all(configs).await
    }

    // =========================================================================
    // Bees & factories
    // =========================================================================

    pub fn list_bees(&self) -> Vec<Arc<BeeHandle>> {
        self.bees.list()
    }

    pub fn get_bee(&self, name: &str) -> Option<Arc<BeeHandle>> {
        self.bees.get(name)
    }

    pub fn list_factories(&self) -> Vec<Arc<dyn BeeFactory>> {
        self.factories.list()
    }

    pub fn get_factory(&self, id: &str) -> Option<Arc<dyn BeeFactory>> {
        self.factories.get(id)
    }

    pub fn stats(&self) -> RegistryStats {
        self.bees.stats()
    }

    // =========================================================================
    // Actions & chains
    // =========================================================================

    pub fn list_actions(&self) -> Vec<Action> {
        self.engine.actions()
    }

    pub fn get_action(&self, id: &str) -> Option<Action> {
        self.engine.action(id)
    }

    /// Replaces the action table without checking references.
    pub fn set_actions(&self, actions: Vec<Action>) {
        self.engine.set_actions(actions);
    }

    /// Replaces the action table. Every action must target a registered bee.
    pub fn replace_actions(&self, actions: Vec<Action>) -> HiveResult<()> {
        if let Some(action) = actions.iter().find(|a| !self.bees.contains(&a.bee)) {
            return Err(HiveError::InvalidReference(format!(
                "action {} targets unknown bee {}",
                action.id, action.bee
            )));
        }
        self.engine.set_actions(actions);
        Ok(())
    }

    pub fn list_chains(&self) -> Vec<Chain> {
        self.engine.chains()
    }

    pub fn get_chain(&self, name: &str) -> Option<Chain> {
        self.engine.chain(name)
    }

    /// Replaces the chain table without checking references.
    pub fn set_chains(&self, chains: Vec<Chain>) {
        self.engine.set_chains(chains);
    }

    /// Replaces the chain table. Every chain must subscribe to a registered
    /// bee and reference existing actions.
    pub fn replace_chains(&self, chains: Vec<Chain>) -> HiveResult<()> {
        for chain in &chains {
            if !self.bees.contains(&chain.event.bee) {
                return Err(HiveError::InvalidReference(format!(
                    "chain {} listens to unknown bee {}",
                    chain.name, chain.event.bee
                )));
            }
            if let Some(id) = chain
                .actions
                .iter()
                .find(|id| self.engine.action(id).is_none())
            {
                return Err(HiveError::InvalidReference(format!(
                    "chain {} references unknown action {id}",
                    chain.name
                )));
            }
        }
        self.engine.set_chains(chains);
        Ok(())
    }

    /// Deletes a chain and the actions it owns.
    pub fn delete_chain(&self, name: &str) -> HiveResult<Chain> {
        self.engine
            .delete_chain(name)
            .ok_or_else(|| HiveError::ChainNotFound(name.to_string()))
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Log messages of `bee`, or of every bee when empty, newest first.
    pub fn get_logs(&self, bee: &str) -> Vec<LogMessage> {
        self.logs.get_logs(bee)
    }

    pub fn get_action_descriptor(&self, action: &Action) -> Option<ActionDescriptor> {
        let bee = self.bees.get(&action.bee)?;
        let factory = self.factories.get(bee.namespace())?;
        factory.actions().into_iter().find(|d| d.name == action.name)
    }

    pub fn get_event_descriptor(&self, event: &Event) -> Option<EventDescriptor> {
        let bee = self.bees.get(&event.bee)?;
        let factory = self.factories.get(bee.namespace())?;
        let descriptor = factory.events().into_iter().find(|d| d.name == event.name);
        if descriptor.is_none() {
            warn!(bee = %event.bee, event = %event.name, "No descriptor for event");
        }
        descriptor
    }

    /// Snapshot of the bee, action and chain configuration.
    pub fn manifest(&self) -> HiveManifest {
        let mut bees: Vec<BeeConfig> = self.bees.list().iter().map(|b| b.config()).collect();
        bees.sort_by(|a, b| a.name.cmp(&b.name));
        HiveManifest {
            bees,
            actions: self.engine.actions(),
            chains: self.engine.chains(),
        }
    }

    /// Context entries of all bees, under the `"context"` key.
    pub fn context_map(&self) -> ValueMap {
        let mut map = ValueMap::new();
        self.context.fill_map(&mut map);
        map
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    pub fn context(&self) -> &Arc<ContextStore> {
        &self.context
    }
}

impl Default for Hive {
    fn default() -> Self {
        Self::new()
    }
}
