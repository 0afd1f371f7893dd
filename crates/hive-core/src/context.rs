//! Per-bee key/value state.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::value::{Value, ValueMap};

/// Process-wide store of bee-private state, keyed by bee name and key.
///
/// A bee only ever reaches its own entries through its
/// [`BeeScope`](crate::bee::BeeScope). Entries are dropped when the bee is
/// removed from the registry.
#[derive(Debug, Default)]
pub struct ContextStore {
    state: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, bee: &str, key: &str, value: impl Into<Value>) {
        self.state
            .write()
            .entry(bee.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Returns a copy of the stored value.
    pub fn value(&self, bee: &str, key: &str) -> Option<Value> {
        self.state
            .read()
            .get(bee)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Drops every entry owned by `bee`.
    pub fn remove_bee(&self, bee: &str) {
        self.state.write().remove(bee);
    }

    /// Inserts a snapshot of all state under the `"context"` key of `map`,
    /// as `{"context": {bee: {key: value}}}`.
    pub fn fill_map(&self, map: &mut ValueMap) {
        let snapshot: ValueMap = self
            .state
            .read()
            .iter()
            .map(|(bee, entries)| {
                let entries: ValueMap = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                (bee.clone(), Value::Map(entries))
            })
            .collect();
        map.insert("context".to_string(), Value::Map(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_by_bee() {
        let store = ContextStore::new();
        store.set("rss", "last_seen", "item-7");
        store.set("irc", "last_seen", 3);

        assert_eq!(store.value("rss", "last_seen"), Some(Value::from("item-7")));
        assert_eq!(store.value("irc", "last_seen"), Some(Value::Int(3)));
        assert_eq!(store.value("cron", "last_seen"), None);
    }

    #[test]
    fn test_fill_map() {
        let store = ContextStore::new();
        store.set("rss", "count", 2);

        let mut map = ValueMap::new();
        store.fill_map(&mut map);

        let count = map
            .get("context")
            .and_then(|context| context.get("rss"))
            .and_then(|rss| rss.get("count"));
        assert_eq!(count, Some(&Value::Int(2)));
    }

    #[test]
    fn test_remove_bee() {
        let store = ContextStore::new();
        store.set("rss", "count", 2);
        store.remove_bee("rss");
        assert_eq!(store.value("rss", "count"), None);
    }
}
