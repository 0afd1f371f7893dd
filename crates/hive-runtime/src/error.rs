//! Runtime error types.

use thiserror::Error;

use hive_framework::HiveError;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hive(#[from] HiveError),

    /// A shutdown or reload signal handler could not be installed.
    #[error("Failed to listen for signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
