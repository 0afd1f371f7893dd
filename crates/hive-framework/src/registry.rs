//! Name-keyed registries of bee factories and bee instances.
//!
//! Both registries are shared between the dispatcher, the chain engine and
//! administration calls, so every table sits behind its own lock and
//! lookups hand out cloned `Arc`s rather than references into the map.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use hive_core::BeeFactory;

use crate::error::{HiveError, HiveResult};
use crate::supervisor::{BeeHandle, BeeState};

// =============================================================================
// FactoryRegistry
// =============================================================================

/// Registry of bee classes, keyed by factory id.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<HashMap<String, Arc<dyn BeeFactory>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. A second factory with the same id is rejected.
    pub fn register(&self, factory: Arc<dyn BeeFactory>) -> HiveResult<()> {
        let id = factory.id().to_string();
        let mut factories = self.factories.write();
        if factories.contains_key(&id) {
            return Err(HiveError::DuplicateFactory(id));
        }

        info!(factory = %id, name = %factory.name(), "Registered bee factory");
        for event in factory.events() {
            debug!(factory = %id, event = %event.name, "Factory provides event");
        }
        for action in factory.actions() {
            debug!(factory = %id, action = %action.name, "Factory provides action");
        }

        factories.insert(id, factory);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn BeeFactory>> {
        self.factories.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.read().contains_key(id)
    }

    /// All factories, in no particular order.
    pub fn list(&self) -> Vec<Arc<dyn BeeFactory>> {
        self.factories.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.factories.read().len()
    }
}

// =============================================================================
// BeeRegistry
// =============================================================================

/// Registry of live bee instances, keyed by instance name.
#[derive(Default)]
pub struct BeeRegistry {
    bees: RwLock<HashMap<String, Arc<BeeHandle>>>,
}

impl BeeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance. Names are unique; a taken name is rejected.
    pub fn register(&self, handle: Arc<BeeHandle>) -> HiveResult<()> {
        let name = handle.name().to_string();
        let mut bees = self.bees.write();
        if bees.contains_key(&name) {
            return Err(HiveError::NameTaken(name));
        }
        debug!(bee = %name, namespace = %handle.namespace(), "Registered bee");
        bees.insert(name, handle);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<BeeHandle>> {
        self.bees.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bees.read().contains_key(name)
    }

    /// All instances, in no particular order.
    pub fn list(&self) -> Vec<Arc<BeeHandle>> {
        self.bees.read().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.bees.read().keys().cloned().collect()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<BeeHandle>> {
        let removed = self.bees.write().remove(name);
        if removed.is_some() {
            debug!(bee = %name, "Unregistered bee");
        }
        removed
    }

    /// Removes every instance and returns them.
    pub fn clear(&self) -> Vec<Arc<BeeHandle>> {
        self.bees.write().drain().map(|(_, handle)| handle).collect()
    }

    pub fn count(&self) -> usize {
        self.bees.read().len()
    }

    pub fn stats(&self) -> RegistryStats {
        let bees = self.bees.read();
        let mut stats = RegistryStats {
            total: bees.len(),
            ..Default::default()
        };
        for handle in bees.values() {
            match handle.state() {
                state if state.is_active() => stats.running += 1,
                BeeState::Faulted => stats.faulted += 1,
                _ => {}
            }
        }
        stats
    }
}

/// Statistics about the bee registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Total number of registered bees.
    pub total: usize,
    /// Bees with a live worker.
    pub running: usize,
    /// Bees that exhausted their restarts.
    pub faulted: usize,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bees: {} total ({} running, {} faulted, {} idle)",
            self.total,
            self.running,
            self.faulted,
            self.total - self.running - self.faulted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_core::{
        Action, Bee, BeeConfig, BeeResult, BeeScope, ContextStore, LogStore, Placeholders,
    };

    struct NullBee;

    #[async_trait]
    impl Bee for NullBee {
        async fn action(&self, _action: &Action) -> BeeResult<Placeholders> {
            Ok(Placeholders::new())
        }
    }

    struct NullFactory;

    impl BeeFactory for NullFactory {
        fn id(&self) -> &str {
            "nullbee"
        }

        fn name(&self) -> &str {
            "Null"
        }

        fn description(&self) -> &str {
            "Does nothing"
        }

        fn create(&self, _config: &BeeConfig, _scope: BeeScope) -> BeeResult<Arc<dyn Bee>> {
            Ok(Arc::new(NullBee))
        }
    }

    fn handle(name: &str) -> Arc<BeeHandle> {
        let scope = BeeScope::new(
            name,
            Arc::new(LogStore::new()),
            Arc::new(ContextStore::new()),
        );
        Arc::new(BeeHandle::new(
            "nullbee",
            BeeConfig::new(name, "nullbee"),
            Arc::new(NullBee),
            scope,
        ))
    }

    #[test]
    fn test_factory_registry() {
        let registry = FactoryRegistry::new();
        registry.register(Arc::new(NullFactory)).unwrap();

        assert!(matches!(
            registry.register(Arc::new(NullFactory)),
            Err(HiveError::DuplicateFactory(id)) if id == "nullbee"
        ));
        assert_eq!(registry.count(), 1);
        assert!(registry.get("nullbee").is_some());
        assert!(registry.get("other").is_none());
        assert_eq!(registry.get("nullbee").unwrap().image(), "nullbee.png");
    }

    #[test]
    fn test_bee_registry_uniqueness() {
        let registry = BeeRegistry::new();
        let first = handle("a");
        registry.register(first.clone()).unwrap();

        assert!(matches!(
            registry.register(handle("a")),
            Err(HiveError::NameTaken(name)) if name == "a"
        ));
        assert!(Arc::ptr_eq(&registry.get("a").unwrap(), &first));

        registry.register(handle("b")).unwrap();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.clear().len(), 1);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_stats_display() {
        let registry = BeeRegistry::new();
        registry.register(handle("a")).unwrap();
        registry.register(handle("b")).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.running, 0);
        assert_eq!(
            stats.to_string(),
            "Bees: 2 total (0 running, 0 faulted, 2 idle)"
        );
    }
}
