//! In-memory per-bee telemetry.
//!
//! Every bee gets a bounded ring of [`LogMessage`]s. Reads return copies
//! sorted newest first, so callers never observe the live collection.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of messages retained per bee.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// How serious a log message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// A single telemetry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: Uuid,
    pub bee: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl LogMessage {
    /// Creates a message stamped with the current time.
    pub fn new(bee: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: Uuid::new_v4(),
            bee: bee.into(),
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        }
    }
}

/// Process-wide log store, guarded by a reader/writer lock.
#[derive(Debug)]
pub struct LogStore {
    entries: RwLock<HashMap<String, VecDeque<LogMessage>>>,
    capacity: usize,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Creates a store keeping at most `capacity` messages per bee.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a new message for `bee`.
    pub fn log(&self, bee: &str, message: impl Into<String>, severity: Severity) {
        self.append(LogMessage::new(bee, message, severity));
    }

    /// Appends a prepared message, evicting the oldest one when full.
    pub fn append(&self, message: LogMessage) {
        let mut entries = self.entries.write();
        let ring = entries.entry(message.bee.clone()).or_default();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(message);
    }

    /// Returns the messages of `bee`, or of every bee when `bee` is empty,
    /// newest first.
    pub fn get_logs(&self, bee: &str) -> Vec<LogMessage> {
        let entries = self.entries.read();
        let mut logs: Vec<LogMessage> = if bee.is_empty() {
            entries
                .values()
                .flat_map(|ring| ring.iter().rev().cloned())
                .collect()
        } else {
            entries
                .get(bee)
                .map(|ring| ring.iter().rev().cloned().collect())
                .unwrap_or_default()
        };
        drop(entries);

        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs
    }

    /// Number of messages retained for `bee`.
    pub fn count(&self, bee: &str) -> usize {
        self.entries.read().get(bee).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn message_at(bee: &str, text: &str, offset_secs: i64) -> LogMessage {
        let mut message = LogMessage::new(bee, text, Severity::Info);
        message.timestamp = DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(offset_secs);
        message
    }

    #[test]
    fn test_newest_first() {
        let store = LogStore::new();
        store.append(message_at("clock", "t1", 1));
        store.append(message_at("clock", "t2", 2));
        store.append(message_at("clock", "t3", 3));

        let texts: Vec<_> = store
            .get_logs("clock")
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(texts, ["t3", "t2", "t1"]);
    }

    #[test]
    fn test_filter_by_bee() {
        let store = LogStore::new();
        store.append(message_at("clock", "tick", 1));
        store.append(message_at("echo", "say", 2));

        assert_eq!(store.get_logs("echo").len(), 1);
        assert_eq!(store.get_logs("").len(), 2);
        assert_eq!(store.get_logs("")[0].bee, "echo");
        assert!(store.get_logs("unknown").is_empty());
    }

    #[test]
    fn test_ring_capacity() {
        let store = LogStore::with_capacity(2);
        store.append(message_at("clock", "a", 1));
        store.append(message_at("clock", "b", 2));
        store.append(message_at("clock", "c", 3));

        assert_eq!(store.count("clock"), 2);
        assert_eq!(store.get_logs("clock")[1].message, "b");
    }

    #[test]
    fn test_equal_timestamps_keep_newest_first() {
        let store = LogStore::new();
        store.append(message_at("clock", "first", 5));
        store.append(message_at("clock", "second", 5));

        assert_eq!(store.get_logs("clock")[0].message, "second");
    }
}
