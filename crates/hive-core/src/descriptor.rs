//! Declarative schemas published by bee factories.
//!
//! Descriptors are static metadata: they describe which options a bee
//! accepts, which events it emits and which actions it handles. The hive
//! uses them to validate configuration and to annotate logs.

use serde::{Deserialize, Serialize};

use crate::placeholder::{BeeOption, BeeOptions};
use crate::value::Value;

/// Describes one field of an event or one parameter of an action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaceholderDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl PlaceholderDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: kind.into(),
        }
    }
}

/// Describes an event a bee class can emit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Id of the factory that owns this event.
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<PlaceholderDescriptor>,
}

/// Describes an action a bee class can execute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Id of the factory that owns this action.
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<PlaceholderDescriptor>,
}

/// Describes a configuration option of a bee class.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeeOptionDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub mandatory: bool,
}

impl BeeOptionDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// Checks `options` against `descriptors` and fills in defaults.
///
/// Returns the completed option list, or the name of the first mandatory
/// option that is neither set nor defaulted.
pub fn complete_options(
    descriptors: &[BeeOptionDescriptor],
    options: &BeeOptions,
) -> Result<BeeOptions, String> {
    let mut completed = options.clone();
    for descriptor in descriptors {
        if options.contains(&descriptor.name) {
            continue;
        }
        if !descriptor.default.is_null() {
            completed.push(BeeOption::new(
                descriptor.name.clone(),
                descriptor.default.clone(),
            ));
        } else if descriptor.mandatory {
            return Err(descriptor.name.clone());
        }
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<BeeOptionDescriptor> {
        vec![
            BeeOptionDescriptor::new("server", "Hostname to connect to", "string").mandatory(),
            BeeOptionDescriptor::new("port", "Port to connect to", "int").with_default(6667),
            BeeOptionDescriptor::new("nick", "Nickname", "string"),
        ]
    }

    #[test]
    fn test_defaults_are_filled() {
        let options = BeeOptions::new().with("server", "irc.example.org");
        let completed = complete_options(&descriptors(), &options).unwrap();

        assert_eq!(completed.bind::<u16>("port").unwrap(), 6667);
        assert!(!completed.contains("nick"));
    }

    #[test]
    fn test_missing_mandatory_option() {
        let options = BeeOptions::new().with("port", 7000);
        assert_eq!(
            complete_options(&descriptors(), &options),
            Err("server".to_string())
        );
    }
}
