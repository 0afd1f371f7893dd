//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use hive_core::{Action, BeeConfig, Chain, DEFAULT_LOG_CAPACITY, HiveManifest};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HiveConfig {
    /// Tracing subscriber settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// In-memory bee log settings.
    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub bees: Vec<BeeConfig>,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub chains: Vec<Chain>,
}

impl HiveConfig {
    /// Copies the bees, actions and chains out of the configuration.
    pub fn manifest(&self) -> HiveManifest {
        HiveManifest {
            bees: self.bees.clone(),
            actions: self.actions.clone(),
            chains: self.chains.clone(),
        }
    }

    /// Replaces the bees, actions and chains, keeping everything else.
    pub fn with_manifest(mut self, manifest: HiveManifest) -> Self {
        self.bees = manifest.bees;
        self.actions = manifest.actions;
        self.chains = manifest.chains;
        self
    }
}

// =============================================================================
// Bee logs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Messages kept per bee before the oldest are dropped.
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `Full` without it.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

/// Span lifecycle events to log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// The `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in each line.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include the source file and line in each line.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Rotated files to keep; `0` keeps all of them.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Per-target level overrides, e.g. `hive_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: HashMap::new(),
        }
    }
}

fn default_max_files() -> u32 {
    5
}
