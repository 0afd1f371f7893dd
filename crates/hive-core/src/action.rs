//! Parameterised commands executed against a target bee.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::placeholder::Placeholders;
use crate::value::Value;

/// Generates a fresh process-unique identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A named, parameterised invocation against the bee called `bee`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: String,
    /// Name of the target bee instance.
    pub bee: String,
    pub name: String,
    #[serde(default)]
    pub options: Placeholders,
}

impl Action {
    /// Creates an action with a freshly generated id.
    pub fn new(bee: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            bee: bee.into(),
            name: name.into(),
            options: Placeholders::new(),
        }
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds a parameter, builder style.
    pub fn with(mut self, name: &str, kind: &str, value: impl Into<Value>) -> Self {
        self.options.set_value(name, kind, value);
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bee, self.name)
    }
}
