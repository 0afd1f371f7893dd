//! Error types for the Hive core.

use thiserror::Error;

/// Errors raised while binding a loosely typed value to a typed destination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// No entry with the requested name exists.
    #[error("{kind} with name {name} not found")]
    NotFound {
        /// What was searched ("Placeholder" or "Option").
        kind: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// The source/destination type pair has no conversion.
    #[error("unhandled type {from} for {to} conversion")]
    Unsupported {
        /// Type of the stored value.
        from: &'static str,
        /// Requested destination type.
        to: &'static str,
    },

    /// A string could not be parsed into the destination type.
    #[error("failed to parse {value:?} as {to}")]
    Parse {
        /// The offending text.
        value: String,
        /// Requested destination type.
        to: &'static str,
    },

    /// A numeric value does not fit the destination type.
    #[error("value {value} is out of range for {to}")]
    OutOfRange {
        /// The offending value, rendered as text.
        value: String,
        /// Requested destination type.
        to: &'static str,
    },
}

impl BindError {
    pub(crate) fn unsupported(from: &'static str, to: &'static str) -> Self {
        Self::Unsupported { from, to }
    }

    pub(crate) fn parse(value: impl Into<String>, to: &'static str) -> Self {
        Self::Parse {
            value: value.into(),
            to,
        }
    }
}

/// Result type for value binding.
pub type BindResult<T> = Result<T, BindError>;

/// Errors raised by bee implementations.
#[derive(Debug, Error)]
pub enum BeeError {
    /// The bee does not know the requested action.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The bee's options could not be bound.
    #[error("invalid options: {0}")]
    Options(#[from] BindError),

    /// The event bus no longer accepts events.
    #[error("event bus closed")]
    BusClosed,

    /// Any other failure reported by the bee.
    #[error("{0}")]
    Failed(String),
}

impl BeeError {
    /// Creates a generic failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Result type for bee operations.
pub type BeeResult<T> = Result<T, BeeError>;
