//! Named, typed values: event fields, action parameters and bee options.

use serde::{Deserialize, Serialize};

use crate::error::{BindError, BindResult};
use crate::value::{FromValue, Value, ValueMap};

/// A named value with a declared type, used for event fields and action
/// parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Placeholder {
    pub name: String,
    /// Declared type, e.g. `"string"`, `"bool"`, `"int"`, `"url"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}

impl Placeholder {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// An ordered list of [`Placeholder`]s. Lookups return the first match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Placeholders(Vec<Placeholder>);

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, placeholder: Placeholder) {
        self.0.push(placeholder);
    }

    /// Sets `name` to `value`, updating an existing entry or appending a new one.
    pub fn set_value(&mut self, name: &str, kind: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut found = false;
        for placeholder in self.0.iter_mut().filter(|p| p.name == name) {
            placeholder.kind = kind.to_string();
            placeholder.value = value.clone();
            found = true;
        }
        if !found {
            self.0.push(Placeholder::new(name, kind, value));
        }
    }

    /// Returns the value of the first placeholder named `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Coerces the value named `name` into `T`.
    pub fn bind<T: FromValue>(&self, name: &str) -> BindResult<T> {
        bind_named(self.value(name), "Placeholder", name)
    }

    /// Builds a name→value map. Earlier entries win on duplicate names.
    pub fn to_map(&self) -> ValueMap {
        let mut map = ValueMap::new();
        for placeholder in &self.0 {
            map.entry(placeholder.name.clone())
                .or_insert_with(|| placeholder.value.clone());
        }
        map
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Placeholder> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Placeholder>> for Placeholders {
    fn from(items: Vec<Placeholder>) -> Self {
        Self(items)
    }
}

impl FromIterator<Placeholder> for Placeholders {
    fn from_iter<I: IntoIterator<Item = Placeholder>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Placeholders {
    type Item = Placeholder;
    type IntoIter = std::vec::IntoIter<Placeholder>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Placeholders {
    type Item = &'a Placeholder;
    type IntoIter = std::slice::Iter<'a, Placeholder>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single configuration option of a bee.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeeOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl BeeOption {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The option list a bee is configured with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeeOptions(Vec<BeeOption>);

impl BeeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an option, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push(BeeOption::new(name, value));
        self
    }

    pub fn push(&mut self, option: BeeOption) {
        self.0.push(option);
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|o| o.name == name).map(|o| &o.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Coerces the option named `name` into `T`.
    pub fn bind<T: FromValue>(&self, name: &str) -> BindResult<T> {
        bind_named(self.value(name), "Option", name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BeeOption> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<BeeOption>> for BeeOptions {
    fn from(items: Vec<BeeOption>) -> Self {
        Self(items)
    }
}

impl FromIterator<BeeOption> for BeeOptions {
    fn from_iter<I: IntoIterator<Item = BeeOption>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn bind_named<T: FromValue>(value: Option<&Value>, kind: &'static str, name: &str) -> BindResult<T> {
    match value {
        Some(value) => T::from_value(value),
        None => Err(BindError::NotFound {
            kind,
            name: name.to_string(),
        }),
    }
}
