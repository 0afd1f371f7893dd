//! Loosely typed values and their coercion into typed destinations.
//!
//! Configuration files, event payloads and action parameters all carry
//! [`Value`]s. Bee code pulls typed data out of them through [`FromValue`],
//! which implements the coercion matrix:
//!
//! | destination        | accepted sources                                        |
//! |--------------------|---------------------------------------------------------|
//! | `String`           | string, bool, int, float, list of strings (joined `,`)  |
//! | `bool`             | bool, string (`true`/`on`/`yes`/`1`/`t`), int, float    |
//! | integers / floats  | int, float, string (parsed)                             |
//! | `Vec<String>`      | list of strings, string (split on `,`)                  |
//! | `Vec<u8>`          | bytes, binary                                           |
//! | [`BinaryValue`]    | binary, bytes                                           |
//! | `Vec<BinaryValue>` | list of bytes / binary                                  |
//! | [`QueryValues`]    | string (URL query syntax)                               |
//!
//! Every other pair is rejected with [`BindError::Unsupported`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{BindError, BindResult};

/// A name-keyed map of values, used as template and filter context.
pub type ValueMap = BTreeMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// A raw byte sequence.
    Bytes(Vec<u8>),
    /// A shared, readable binary blob.
    Binary(BinaryValue),
    /// An ordered list.
    List(Vec<Value>),
    /// A string-keyed map.
    Map(ValueMap),
}

impl Value {
    /// Returns a short name for the contained type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Binary(_) => "binary",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value as `f64` for ints and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up `key` when this value is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Truthiness as used by template conditionals: `false`, zero, null and
    /// empty strings/collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::Binary(b) => !b.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
        }
    }

    /// Coerces this value into `T`.
    pub fn bind<T: FromValue>(&self) -> BindResult<T> {
        T::from_value(self)
    }

    /// Converts into a JSON value. Byte data is encoded as base64.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
            Self::Binary(binary) => serde_json::Value::String(BASE64.encode(binary.as_bytes())),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "<no value>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Bytes(bytes) => {
                write!(f, "[")?;
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{byte}")?;
                }
                write!(f, "]")
            }
            Self::Binary(binary) => write!(f, "<binary {} bytes>", binary.len()),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "map[")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<BinaryValue> for Value {
    fn from(binary: BinaryValue) -> Self {
        Self::Binary(binary)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(Self::String).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Self::Map(map)
    }
}

// =============================================================================
// BinaryValue
// =============================================================================

/// A cheaply clonable binary blob that can be read as a stream.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryValue {
    data: Arc<[u8]>,
}

impl BinaryValue {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Arc::from(data.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copies the blob back into an owned byte vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Returns a reader over the blob's contents.
    pub fn reader(&self) -> impl std::io::Read + '_ {
        &self.data[..]
    }
}

impl Default for BinaryValue {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for BinaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryValue({} bytes)", self.data.len())
    }
}

impl From<Vec<u8>> for BinaryValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for BinaryValue {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

// =============================================================================
// QueryValues
// =============================================================================

/// Parsed URL query parameters (`a=1&b=2&a=3`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryValues(BTreeMap<String, Vec<String>>);

impl QueryValues {
    /// Parses a query string. Malformed percent escapes are kept verbatim.
    pub fn parse(query: &str) -> Self {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            values
                .entry(decode_component(key))
                .or_default()
                .push(decode_component(value));
        }
        Self(values)
    }

    /// Returns the first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value for `key`.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

fn decode_component(raw: &str) -> String {
    let plus_as_space = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(plus_as_space.as_bytes())).into_owned()
}

// =============================================================================
// Coercion
// =============================================================================

/// Types that can be produced from a [`Value`].
pub trait FromValue: Sized {
    /// Name of the destination type, used in error messages.
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> BindResult<Self>;
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: &Value) -> BindResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| BindError::unsupported(value.type_name(), Self::TYPE_NAME))
                })
                .collect::<BindResult<Vec<_>>>()
                .map(|parts| parts.join(",")),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => Ok(matches!(
                s.to_lowercase().as_str(),
                "true" | "on" | "yes" | "1" | "t"
            )),
            Value::Int(i) => Ok(*i > 0),
            Value::Float(f) => Ok(*f > 0.0),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

fn to_i64(value: &Value, to: &'static str) -> BindResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) => float_to_i64(*f, to),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(i);
            }
            match trimmed.parse::<f64>() {
                Ok(f) => float_to_i64(f, to),
                Err(_) => Err(BindError::parse(s.as_str(), to)),
            }
        }
        other => Err(BindError::unsupported(other.type_name(), to)),
    }
}

fn float_to_i64(f: f64, to: &'static str) -> BindResult<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Ok(f.trunc() as i64)
    } else {
        Err(BindError::OutOfRange {
            value: f.to_string(),
            to,
        })
    }
}

fn to_f64(value: &Value, to: &'static str) -> BindResult<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| BindError::parse(s.as_str(), to)),
        other => Err(BindError::unsupported(other.type_name(), to)),
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "i64";

    fn from_value(value: &Value) -> BindResult<Self> {
        to_i64(value, Self::TYPE_NAME)
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn from_value(value: &Value) -> BindResult<Self> {
                    let wide = to_i64(value, Self::TYPE_NAME)?;
                    <$ty>::try_from(wide).map_err(|_| BindError::OutOfRange {
                        value: wide.to_string(),
                        to: Self::TYPE_NAME,
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: &Value) -> BindResult<Self> {
        to_f64(value, Self::TYPE_NAME)
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn from_value(value: &Value) -> BindResult<Self> {
        to_f64(value, Self::TYPE_NAME).map(|f| f as f32)
    }
}

impl FromValue for Vec<String> {
    const TYPE_NAME: &'static str = "string list";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::String(s) => Ok(s.split(',').map(str::to_string).collect()),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| BindError::unsupported(item.type_name(), Self::TYPE_NAME))
                })
                .collect(),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

impl FromValue for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            Value::Binary(binary) => Ok(binary.to_vec()),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

impl FromValue for BinaryValue {
    const TYPE_NAME: &'static str = "binary";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::Binary(binary) => Ok(binary.clone()),
            Value::Bytes(bytes) => Ok(BinaryValue::new(bytes.clone())),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

impl FromValue for Vec<BinaryValue> {
    const TYPE_NAME: &'static str = "binary list";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Bytes(_) | Value::Binary(_) => BinaryValue::from_value(item),
                    other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
                })
                .collect(),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

impl FromValue for QueryValues {
    const TYPE_NAME: &'static str = "query values";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::String(s) => Ok(QueryValues::parse(s)),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

impl FromValue for ValueMap {
    const TYPE_NAME: &'static str = "map";

    fn from_value(value: &Value) -> BindResult<Self> {
        match value {
            Value::Map(map) => Ok(map.clone()),
            other => Err(BindError::unsupported(other.type_name(), Self::TYPE_NAME)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_string_destination() {
        assert_eq!(Value::Bool(true).bind::<String>().unwrap(), "true");
        assert_eq!(Value::Int(42).bind::<String>().unwrap(), "42");
        assert_eq!(Value::Float(1.5).bind::<String>().unwrap(), "1.5");
        assert_eq!(Value::from("hi").bind::<String>().unwrap(), "hi");
        assert_eq!(
            Value::from(vec!["a".to_string(), "b".to_string()])
                .bind::<String>()
                .unwrap(),
            "a,b"
        );
    }

    #[test]
    fn test_bool_destination() {
        for yes in ["yes", "YES", "true", "On", "1", "t"] {
            assert!(Value::from(yes).bind::<bool>().unwrap(), "{yes}");
        }
        assert!(!Value::from("nope").bind::<bool>().unwrap());
        assert!(Value::Int(3).bind::<bool>().unwrap());
        assert!(!Value::Int(0).bind::<bool>().unwrap());
        assert!(!Value::Float(-1.0).bind::<bool>().unwrap());
    }

    #[test]
    fn test_numeric_destination() {
        assert_eq!(Value::from("17").bind::<i64>().unwrap(), 17);
        assert_eq!(Value::from(" 2.9 ").bind::<i32>().unwrap(), 2);
        assert_eq!(Value::Int(7).bind::<f64>().unwrap(), 7.0);
        assert_eq!(Value::Float(7.8).bind::<u8>().unwrap(), 7);
        assert!(matches!(
            Value::Int(300).bind::<u8>(),
            Err(BindError::OutOfRange { to: "u8", .. })
        ));
        assert!(matches!(
            Value::from("abc").bind::<f64>(),
            Err(BindError::Parse { .. })
        ));
    }

    #[test]
    fn test_unsupported_pair_is_explicit() {
        let list = Value::from(vec!["a".to_string()]);
        assert_eq!(
            list.bind::<bool>(),
            Err(BindError::Unsupported {
                from: "list",
                to: "bool"
            })
        );
        assert!(Value::Bool(true).bind::<Vec<u8>>().is_err());
        assert!(Value::Map(ValueMap::new()).bind::<String>().is_err());
    }

    #[test]
    fn test_string_list_destination() {
        assert_eq!(
            Value::from("a,b,c").bind::<Vec<String>>().unwrap(),
            vec!["a", "b", "c"]
        );
        let mixed = Value::List(vec![Value::from("a"), Value::Int(1)]);
        assert!(mixed.bind::<Vec<String>>().is_err());
    }

    #[test]
    fn test_binary_round_trip() {
        let bytes = b"hello".to_vec();
        let binary = Value::from(bytes.clone()).bind::<BinaryValue>().unwrap();
        let mut read = Vec::new();
        binary.reader().read_to_end(&mut read).unwrap();
        assert_eq!(read, bytes);

        let back = Value::from(binary).bind::<Vec<u8>>().unwrap();
        assert_eq!(back, bytes);
    }

    #[test]
    fn test_binary_list() {
        let list = Value::List(vec![Value::from(b"a".to_vec()), Value::from(b"bc".to_vec())]);
        let blobs = list.bind::<Vec<BinaryValue>>().unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[1].as_bytes(), b"bc");
    }

    #[test]
    fn test_query_values() {
        let query = Value::from("a=1&b=hello+world&a=%2F&c")
            .bind::<QueryValues>()
            .unwrap();
        assert_eq!(query.get("a"), Some("1"));
        assert_eq!(query.get_all("a"), ["1", "/"]);
        assert_eq!(query.get("b"), Some("hello world"));
        assert_eq!(query.get("c"), Some(""));
    }

    #[test]
    fn test_query_values_decoding() {
        let query = QueryValues::parse("q=caf%C3%A9&bad=100%&odd=%zz%41&sp=a%20b+c");
        assert_eq!(query.get("q"), Some("café"));
        assert_eq!(query.get("bad"), Some("100%"));
        assert_eq!(query.get("odd"), Some("%zzA"));
        assert_eq!(query.get("sp"), Some("a b c"));
        assert_eq!(query.len(), 4);
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"n": 1, "f": 2.5, "s": "x", "l": [true, null]});
        let value = Value::from(json.clone());
        assert_eq!(value.get("n"), Some(&Value::Int(1)));
        assert_eq!(value.get("f"), Some(&Value::Float(2.5)));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_display() {
        let list = Value::List(vec![Value::from("a"), Value::Int(2)]);
        assert_eq!(list.to_string(), "[a 2]");
        assert_eq!(Value::Null.to_string(), "<no value>");
        assert_eq!(Value::Float(3.0).to_string(), "3");
    }
}
