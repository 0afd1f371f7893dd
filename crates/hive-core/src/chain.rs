//! Rules binding an event pattern to filters and actions.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::event::EventPattern;

/// A user rule: when `event` fires and every filter passes, run `actions`
/// in order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Chain {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub event: EventPattern,
    /// Filter sources, evaluated in order.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Ids of the actions to execute, in order.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Inline definitions from the older configuration format. They are
    /// folded into `filters`/`actions` when the chain list is installed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ChainElement>,
}

impl Chain {
    pub fn new(name: impl Into<String>, event: EventPattern) -> Self {
        Self {
            name: name.into(),
            event,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_filter(mut self, source: impl Into<String>) -> Self {
        self.filters.push(source.into());
        self
    }

    pub fn with_action(mut self, id: impl Into<String>) -> Self {
        self.actions.push(id.into());
        self
    }
}

/// An inline action and/or filter of the older chain format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChainElement {
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub filter: Option<ElementFilter>,
}

/// A named filter source inside a [`ChainElement`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementFilter {
    #[serde(default)]
    pub name: String,
    pub source: String,
}
