//! Chain filters.
//!
//! A filter is a source string evaluated against an event's placeholders.
//! [`FilterKind::classify`] picks the language from the source, and the
//! [`FilterRegistry`] maps that language to an evaluator. Only the
//! template evaluator ships with the framework; a script evaluator can be
//! registered under [`SCRIPT_EVALUATOR`].

mod template;

pub use template::TemplateFilter;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use hive_core::ValueMap;

use crate::error::{FilterError, FilterResult, panic_message};

/// Registry name of the template evaluator.
pub const TEMPLATE_EVALUATOR: &str = "template";

/// Registry name of the script evaluator.
pub const SCRIPT_EVALUATOR: &str = "script";

/// Sources containing this marker are treated as scripts.
pub const SCRIPT_MARKER: &str = "def main(";

/// A filter language evaluator.
pub trait FilterEvaluator: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Returns whether `source` passes for the given event values.
    fn passes(&self, data: &ValueMap, source: &str) -> FilterResult<bool>;
}

/// The language of a filter source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Template,
    Script,
}

impl FilterKind {
    pub fn classify(source: &str) -> Self {
        if source.contains(SCRIPT_MARKER) {
            Self::Script
        } else {
            Self::Template
        }
    }

    /// Name of the evaluator handling this kind.
    pub fn evaluator(self) -> &'static str {
        match self {
            Self::Template => TEMPLATE_EVALUATOR,
            Self::Script => SCRIPT_EVALUATOR,
        }
    }
}

/// Name-keyed set of filter evaluators.
pub struct FilterRegistry {
    evaluators: RwLock<HashMap<String, Arc<dyn FilterEvaluator>>>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            evaluators: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with the template evaluator installed.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(TemplateFilter));
        registry
    }

    /// Registers an evaluator under its own name, replacing any previous one.
    pub fn register(&self, evaluator: Arc<dyn FilterEvaluator>) {
        let name = evaluator.name().to_string();
        debug!(filter = %name, "Registered filter evaluator");
        self.evaluators.write().insert(name, evaluator);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FilterEvaluator>> {
        self.evaluators.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.evaluators.read().keys().cloned().collect()
    }

    /// Classifies `source` and runs it through the matching evaluator.
    ///
    /// A panicking evaluator is reported as [`FilterError::Panicked`].
    pub fn evaluate(&self, data: &ValueMap, source: &str) -> FilterResult<bool> {
        let kind = FilterKind::classify(source);
        let evaluator = self
            .get(kind.evaluator())
            .ok_or_else(|| FilterError::Unavailable(kind.evaluator().to_string()))?;

        catch_unwind(AssertUnwindSafe(|| evaluator.passes(data, source)))
            .unwrap_or_else(|panic| Err(FilterError::Panicked(panic_message(panic.as_ref()))))
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::Value;

    struct Exploding;

    impl FilterEvaluator for Exploding {
        fn name(&self) -> &str {
            SCRIPT_EVALUATOR
        }

        fn description(&self) -> &str {
            "panics on every call"
        }

        fn passes(&self, _data: &ValueMap, _source: &str) -> FilterResult<bool> {
            panic!("boom")
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(FilterKind::classify("{{test eq .a 1}}"), FilterKind::Template);
        assert_eq!(
            FilterKind::classify("def main(data):\n  return True"),
            FilterKind::Script
        );
        assert_eq!(FilterKind::Script.evaluator(), "script");
    }

    #[test]
    fn test_script_unavailable_by_default() {
        let registry = FilterRegistry::with_defaults();
        let result = registry.evaluate(&ValueMap::new(), "def main(x): return True");
        assert!(matches!(result, Err(FilterError::Unavailable(name)) if name == "script"));
    }

    #[test]
    fn test_template_filter_through_registry() {
        let registry = FilterRegistry::default();
        let mut data = ValueMap::new();
        data.insert("text".into(), Value::from("hello"));

        assert!(registry.evaluate(&data, "{{test eq .text \"hello\"}}").unwrap());
        assert!(!registry.evaluate(&data, "{{test eq .text \"bye\"}}").unwrap());
    }

    #[test]
    fn test_panic_is_trapped() {
        let registry = FilterRegistry::with_defaults();
        registry.register(Arc::new(Exploding));

        let result = registry.evaluate(&ValueMap::new(), "def main(): pass");
        assert!(matches!(result, Err(FilterError::Panicked(msg)) if msg == "boom"));
    }
}
