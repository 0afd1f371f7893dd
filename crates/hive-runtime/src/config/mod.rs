//! Configuration module for the Hive runtime.
//!
//! A [`HiveConfig`] holds the logging setup, the log ring size and the
//! user manifest (bees, actions and chains). It is assembled by
//! [`ConfigLoader`] from defaults, files and `HIVE_*` environment variables
//! and checked by [`validate_config`] before the runtime applies it.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    HiveConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, LogsConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
