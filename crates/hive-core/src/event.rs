//! Events published by bees.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::placeholder::Placeholders;
use crate::value::Value;

/// A fact published by a bee: its source, its name and typed fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    /// Name of the bee instance that emitted the event.
    pub bee: String,
    pub name: String,
    #[serde(default)]
    pub options: Placeholders,
}

impl Event {
    pub fn new(bee: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bee: bee.into(),
            name: name.into(),
            options: Placeholders::new(),
        }
    }

    /// Adds a field, builder style.
    pub fn with(mut self, name: &str, kind: &str, value: impl Into<Value>) -> Self {
        self.options.set_value(name, kind, value);
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bee, self.name)
    }
}

/// The `(bee, event name)` pair a chain subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventPattern {
    pub bee: String,
    pub name: String,
}

impl EventPattern {
    pub fn new(bee: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bee: bee.into(),
            name: name.into(),
        }
    }

    /// Exact match on both source bee and event name.
    pub fn matches(&self, event: &Event) -> bool {
        self.bee == event.bee && self.name == event.name
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bee, self.name)
    }
}
