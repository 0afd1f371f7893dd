//! The chain engine: matches events to chains, evaluates filters and runs
//! actions.
//!
//! For each chain subscribed to an event:
//!
//! 1. Filters run in order against the event's placeholders and the first
//!    one that does not pass ends the chain. An evaluator error counts as
//!    not passing.
//! 2. Actions run in order. String options are rendered as templates over
//!    the same placeholders before the target bee receives the action.
//!
//! Chains subscribed to the same event run concurrently; nothing inside one
//! chain overlaps. Faults abort only the chain they happen in.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use hive_core::{
    Action, Chain, Event, LogStore, Placeholder, Placeholders, Severity, Value, ValueMap, new_id,
};

use crate::error::{TemplateResult, panic_message};
use crate::filter::FilterRegistry;
use crate::registry::BeeRegistry;
use crate::template::Template;

/// How one chain ended for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// The filter at this index did not pass.
    Filtered { filter: usize },
    /// All filters passed; `executed` actions reached their bee.
    Completed { executed: usize },
    /// An action could not be resolved, rendered or executed.
    Aborted { reason: String },
}

/// Chain and action tables plus the logic that runs them.
pub struct ChainEngine {
    chains: RwLock<Vec<Chain>>,
    actions: RwLock<Vec<Action>>,
    bees: Arc<BeeRegistry>,
    filters: Arc<FilterRegistry>,
    logs: Arc<LogStore>,
}

impl ChainEngine {
    pub fn new(bees: Arc<BeeRegistry>, filters: Arc<FilterRegistry>, logs: Arc<LogStore>) -> Self {
        Self {
            chains: RwLock::new(Vec::new()),
            actions: RwLock::new(Vec::new()),
            bees,
            filters,
            logs,
        }
    }

    // =========================================================================
    // Tables
    // =========================================================================

    pub fn chains(&self) -> Vec<Chain> {
        self.chains.read().clone()
    }

    pub fn chain(&self, name: &str) -> Option<Chain> {
        self.chains.read().iter().find(|c| c.name == name).cloned()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.read().clone()
    }

    pub fn action(&self, id: &str) -> Option<Action> {
        self.actions.read().iter().find(|a| a.id == id).cloned()
    }

    pub fn set_actions(&self, actions: Vec<Action>) {
        *self.actions.write() = actions;
    }

    /// Replaces the chain table.
    ///
    /// Chains still using the legacy `elements` list are converted: element
    /// actions get a fresh id and join the action table, element filters are
    /// appended to the chain's filters.
    pub fn set_chains(&self, chains: Vec<Chain>) {
        let mut table = self.chains.write();
        let mut actions = self.actions.write();

        *table = chains
            .into_iter()
            .map(|mut chain| {
                for element in std::mem::take(&mut chain.elements) {
                    if let Some(mut action) = element.action {
                        action.id = new_id();
                        chain.actions.push(action.id.clone());
                        actions.push(action);
                    }
                    if let Some(filter) = element.filter {
                        chain.filters.push(filter.source);
                    }
                }
                chain
            })
            .collect();
    }

    /// Removes a chain together with the actions it references.
    pub fn delete_chain(&self, name: &str) -> Option<Chain> {
        let mut table = self.chains.write();
        let mut actions = self.actions.write();

        let position = table.iter().position(|c| c.name == name)?;
        let chain = table.remove(position);
        actions.retain(|a| !chain.actions.contains(&a.id));
        info!(chain = %name, "Deleted chain");
        Some(chain)
    }

    /// Chains subscribed to exactly this event's bee and name.
    pub fn matching(&self, event: &Event) -> Vec<Chain> {
        self.chains
            .read()
            .iter()
            .filter(|c| c.event.matches(event))
            .cloned()
            .collect()
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Runs every chain subscribed to `event` and reports how each ended,
    /// in chain table order.
    pub async fn process(&self, event: &Event) -> Vec<ChainOutcome> {
        let chains = self.matching(event);
        if chains.is_empty() {
            debug!(event = %event, "No chain subscribed to event");
            return Vec::new();
        }

        let data = event.options.to_map();
        let data = &data;
        let runs = chains.iter().map(|chain| async move {
            match AssertUnwindSafe(self.run_chain(chain, event, data))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let reason = format!("panic: {}", panic_message(panic.as_ref()));
                    error!(chain = %chain.name, event = %event, "Chain panicked: {reason}");
                    self.logs.log(
                        &event.bee,
                        format!("Chain {} panicked: {reason}", chain.name),
                        Severity::Error,
                    );
                    ChainOutcome::Aborted { reason }
                }
            }
        });
        join_all(runs).await
    }

    async fn run_chain(&self, chain: &Chain, event: &Event, data: &ValueMap) -> ChainOutcome {
        for (index, source) in chain.filters.iter().enumerate() {
            match self.filters.evaluate(data, source) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(chain = %chain.name, filter = index, "Filter did not pass");
                    return ChainOutcome::Filtered { filter: index };
                }
                Err(e) => {
                    warn!(chain = %chain.name, filter = index, error = %e, "Filter failed");
                    self.logs.log(
                        &event.bee,
                        format!("Chain {}: filter {index} failed: {e}", chain.name),
                        Severity::Error,
                    );
                    return ChainOutcome::Filtered { filter: index };
                }
            }
        }

        let mut executed = 0;
        for id in &chain.actions {
            let Some(action) = self.action(id) else {
                return self.abort(&event.bee, chain, format!("action {id} not found"));
            };

            let rendered = match render_action(&action, data) {
                Ok(rendered) => rendered,
                Err(e) => {
                    return self.abort(
                        &action.bee,
                        chain,
                        format!("cannot render options of action {action}: {e}"),
                    );
                }
            };

            let Some(target) = self.bees.get(&action.bee) else {
                return self.abort(&event.bee, chain, format!("bee {} not found", action.bee));
            };

            if !target.is_running() {
                target.scope().log(format!(
                    "Skipping action {} from chain {}, bee is not running",
                    action.name, chain.name
                ));
                continue;
            }

            debug!(chain = %chain.name, action = %action, "Executing action");
            match target.execute(&rendered).await {
                Ok(_) => executed += 1,
                Err(e) => {
                    return self.abort(
                        &action.bee,
                        chain,
                        format!("action {} failed: {e}", action.name),
                    );
                }
            }
        }

        debug!(chain = %chain.name, executed, "Chain completed");
        ChainOutcome::Completed { executed }
    }

    fn abort(&self, bee: &str, chain: &Chain, reason: String) -> ChainOutcome {
        error!(bee = %bee, chain = %chain.name, "Chain aborted: {reason}");
        self.logs.log(
            bee,
            format!("Chain {} aborted: {reason}", chain.name),
            Severity::Error,
        );
        ChainOutcome::Aborted { reason }
    }
}

/// Renders the string options of `action` against the event values.
/// Other option types are passed through unchanged.
pub fn render_action(action: &Action, data: &ValueMap) -> TemplateResult<Action> {
    let options = action
        .options
        .iter()
        .map(|option| -> TemplateResult<Placeholder> {
            match &option.value {
                Value::String(source) => {
                    let template = Template::parse(option.name.as_str(), source)?;
                    Ok(Placeholder::new(
                        option.name.clone(),
                        "string",
                        template.render(data)?,
                    ))
                }
                _ => Ok(option.clone()),
            }
        })
        .collect::<TemplateResult<Placeholders>>()?;

    Ok(Action {
        options,
        ..action.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_core::{
        Bee, BeeConfig, BeeError, BeeResult, BeeScope, ChainElement, ContextStore,
        ElementFilter, EventBus, EventPattern, EventReceiver,
    };
    use parking_lot::Mutex;

    use crate::supervisor::BeeHandle;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<Action>>,
    }

    #[async_trait]
    impl Bee for Recorder {
        async fn action(&self, action: &Action) -> BeeResult<Placeholders> {
            if action.name == "explode" {
                return Err(BeeError::UnknownAction(action.name.clone()));
            }
            self.received.lock().push(action.clone());
            Ok(Placeholders::new())
        }
    }

    struct Fixture {
        engine: ChainEngine,
        logs: Arc<LogStore>,
        recorder: Arc<Recorder>,
        bees: Arc<BeeRegistry>,
        _rx: EventReceiver,
    }

    impl Fixture {
        async fn new() -> Self {
            let logs = Arc::new(LogStore::new());
            let bees = Arc::new(BeeRegistry::new());
            let recorder = Arc::new(Recorder::default());
            let (bus, rx) = EventBus::new();

            let handle = Arc::new(BeeHandle::new(
                "recorder",
                BeeConfig::new("echoer", "recorder"),
                recorder.clone(),
                BeeScope::new("echoer", logs.clone(), Arc::new(ContextStore::new())),
            ));
            bees.register(handle.clone()).unwrap();
            handle.start(bus.sink()).await;

            let idle = Arc::new(BeeHandle::new(
                "recorder",
                BeeConfig::new("sleeper", "recorder"),
                Arc::new(Recorder::default()),
                BeeScope::new("sleeper", logs.clone(), Arc::new(ContextStore::new())),
            ));
            bees.register(idle).unwrap();

            let engine = ChainEngine::new(
                bees.clone(),
                Arc::new(FilterRegistry::with_defaults()),
                logs.clone(),
            );
            Self {
                engine,
                logs,
                recorder,
                bees,
                _rx: rx,
            }
        }

        fn names(&self) -> Vec<String> {
            self.recorder
                .received
                .lock()
                .iter()
                .map(|a| a.name.clone())
                .collect()
        }
    }

    fn tick() -> Event {
        Event::new("clock", "tick").with("user", "string", "alice")
    }

    #[tokio::test]
    async fn test_end_to_end_echo() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("echoer", "say")
                .with_id("a1")
                .with("text", "string", "hi"),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("greet", EventPattern::new("clock", "tick")).with_action("a1"),
        ]);

        let outcomes = fx.engine.process(&Event::new("clock", "tick")).await;
        assert_eq!(outcomes, vec![ChainOutcome::Completed { executed: 1 }]);

        let received = fx.recorder.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].name, "say");
        assert_eq!(received[0].options.bind::<String>("text").unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_chain_matching_is_exact() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("echoer", "first").with_id("a1"),
            Action::new("echoer", "second").with_id("a2"),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("tick", EventPattern::new("clock", "tick")).with_action("a1"),
            Chain::new("other", EventPattern::new("clock", "other")).with_action("a2"),
            Chain::new("elsewhere", EventPattern::new("timer", "tick")).with_action("a2"),
        ]);

        let outcomes = fx.engine.process(&tick()).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(fx.names(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_filter_short_circuit() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("echoer", "one").with_id("a1"),
            Action::new("echoer", "two").with_id("a2"),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("blocked", EventPattern::new("clock", "tick"))
                .with_filter("{{test true}}")
                .with_filter("{{test false}}")
                .with_filter("{{test true}}")
                .with_action("a1"),
        ]);
        let outcomes = fx.engine.process(&tick()).await;
        assert_eq!(outcomes, vec![ChainOutcome::Filtered { filter: 1 }]);
        assert!(fx.names().is_empty());

        fx.engine.set_chains(vec![
            Chain::new("open", EventPattern::new("clock", "tick"))
                .with_filter("{{test true}}")
                .with_filter("{{test eq .user \"alice\"}}")
                .with_action("a1")
                .with_action("a2"),
        ]);
        fx.engine.process(&tick()).await;
        assert_eq!(fx.names(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_filter_error_counts_as_failure() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![Action::new("echoer", "one").with_id("a1")]);
        fx.engine.set_chains(vec![
            Chain::new("scripted", EventPattern::new("clock", "tick"))
                .with_filter("def main(event):\n    return True")
                .with_action("a1"),
        ]);

        let outcomes = fx.engine.process(&tick()).await;
        assert_eq!(outcomes, vec![ChainOutcome::Filtered { filter: 0 }]);
        assert_eq!(fx.logs.count("clock"), 1);
        assert!(fx.names().is_empty());
    }

    #[tokio::test]
    async fn test_options_are_rendered() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("echoer", "say")
                .with_id("a1")
                .with("text", "string", "hi {{.user}}")
                .with("times", "int", 2),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("greet", EventPattern::new("clock", "tick")).with_action("a1"),
        ]);

        fx.engine.process(&tick()).await;
        let received = fx.recorder.received.lock();
        assert_eq!(received[0].options.bind::<String>("text").unwrap(), "hi alice");
        assert_eq!(received[0].options.value("times"), Some(&Value::Int(2)));
    }

    #[tokio::test]
    async fn test_stopped_target_is_skipped() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("sleeper", "nap").with_id("a1"),
            Action::new("echoer", "after").with_id("a2"),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("mixed", EventPattern::new("clock", "tick"))
                .with_action("a1")
                .with_action("a2"),
        ]);

        let outcomes = fx.engine.process(&tick()).await;
        assert_eq!(outcomes, vec![ChainOutcome::Completed { executed: 1 }]);
        assert_eq!(fx.names(), vec!["after"]);
        assert_eq!(fx.logs.count("sleeper"), 1);
    }

    #[tokio::test]
    async fn test_missing_action_aborts_chain() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![Action::new("echoer", "late").with_id("a2")]);
        fx.engine.set_chains(vec![
            Chain::new("broken", EventPattern::new("clock", "tick"))
                .with_action("missing")
                .with_action("a2"),
            Chain::new("healthy", EventPattern::new("clock", "tick")).with_action("a2"),
        ]);

        let outcomes = fx.engine.process(&tick()).await;
        assert!(matches!(outcomes[0], ChainOutcome::Aborted { .. }));
        assert_eq!(outcomes[1], ChainOutcome::Completed { executed: 1 });
        assert_eq!(fx.names(), vec!["late"]);
        assert_eq!(fx.logs.get_logs("clock").len(), 1);
    }

    #[tokio::test]
    async fn test_action_error_aborts_remaining() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("echoer", "explode").with_id("a1"),
            Action::new("echoer", "never").with_id("a2"),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("boom", EventPattern::new("clock", "tick"))
                .with_action("a1")
                .with_action("a2"),
        ]);

        let outcomes = fx.engine.process(&tick()).await;
        assert!(matches!(outcomes[0], ChainOutcome::Aborted { .. }));
        assert!(fx.names().is_empty());
        assert_eq!(fx.logs.get_logs("echoer")[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_template_error_aborts_chain() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("echoer", "say")
                .with_id("a1")
                .with("text", "string", "{{if .user}}unterminated"),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("bad", EventPattern::new("clock", "tick")).with_action("a1"),
        ]);

        let outcomes = fx.engine.process(&tick()).await;
        assert!(matches!(outcomes[0], ChainOutcome::Aborted { .. }));
        assert!(fx.names().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_elements_are_migrated() {
        let fx = Fixture::new().await;
        let mut chain = Chain::new("legacy", EventPattern::new("clock", "tick"));
        chain.elements = vec![
            ChainElement {
                action: None,
                filter: Some(ElementFilter {
                    name: "only alice".into(),
                    source: "{{test eq .user \"alice\"}}".into(),
                }),
            },
            ChainElement {
                action: Some(Action::new("echoer", "say").with_id("")),
                filter: None,
            },
        ];
        fx.engine.set_chains(vec![chain]);

        let chain = fx.engine.chain("legacy").unwrap();
        assert!(chain.elements.is_empty());
        assert_eq!(chain.filters.len(), 1);
        assert_eq!(chain.actions.len(), 1);
        assert!(!chain.actions[0].is_empty());
        assert!(fx.engine.action(&chain.actions[0]).is_some());

        fx.engine.process(&tick()).await;
        assert_eq!(fx.names(), vec!["say"]);
    }

    #[tokio::test]
    async fn test_delete_chain() {
        let fx = Fixture::new().await;
        fx.engine.set_actions(vec![
            Action::new("echoer", "one").with_id("a1"),
            Action::new("echoer", "two").with_id("a2"),
        ]);
        fx.engine.set_chains(vec![
            Chain::new("first", EventPattern::new("clock", "tick")).with_action("a1"),
            Chain::new("second", EventPattern::new("clock", "tick")).with_action("a2"),
        ]);

        let removed = fx.engine.delete_chain("first").unwrap();
        assert_eq!(removed.name, "first");
        assert!(fx.engine.delete_chain("first").is_none());
        assert!(fx.engine.action("a1").is_none());
        assert!(fx.engine.action("a2").is_some());
        assert_eq!(fx.engine.chains().len(), 1);
        assert_eq!(fx.bees.count(), 2);
    }

    #[tokio::test]
    async fn test_process_on_spawned_task() {
        let Fixture {
            engine,
            recorder,
            _rx: rx,
            ..
        } = Fixture::new().await;
        engine.set_actions(vec![
            Action::new("echoer", "one").with_id("a1"),
            Action::new("echoer", "two").with_id("a2"),
        ]);
        engine.set_chains(vec![
            Chain::new("first", EventPattern::new("clock", "tick")).with_action("a1"),
            Chain::new("second", EventPattern::new("clock", "tick"))
                .with_filter("{{test eq .user \"alice\"}}")
                .with_action("a2"),
        ]);

        let engine = Arc::new(engine);
        let outcomes = tokio::spawn(async move { engine.process(&tick()).await })
            .await
            .unwrap();
        assert_eq!(
            outcomes,
            vec![
                ChainOutcome::Completed { executed: 1 },
                ChainOutcome::Completed { executed: 1 },
            ]
        );

        let mut names: Vec<_> = recorder
            .received
            .lock()
            .iter()
            .map(|a| a.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["one", "two"]);
        drop(rx);
    }
}
