//! Error types for the Hive framework.

use thiserror::Error;

use hive_core::BeeError;

/// Errors raised while parsing or executing a template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// The template source is malformed.
    #[error("template parse error at offset {offset}: {message}")]
    Parse {
        /// Byte offset into the source.
        offset: usize,
        message: String,
    },

    /// A function name is not known.
    #[error("function {0:?} not defined")]
    UnknownFunction(String),

    /// A function was called with the wrong number of arguments.
    #[error("wrong number of args for {name}: want {expected}, got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    /// Evaluation failed.
    #[error("template execution failed: {0}")]
    Exec(String),
}

impl TemplateError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn exec(message: impl Into<String>) -> Self {
        Self::Exec(message.into())
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors raised while evaluating a filter.
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    /// No evaluator is registered for the selected filter language.
    #[error("no filter evaluator registered for {0:?}")]
    Unavailable(String),

    /// The template evaluator failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The evaluator panicked.
    #[error("filter evaluator panicked: {0}")]
    Panicked(String),

    /// Any other evaluator failure.
    #[error("{0}")]
    Failed(String),
}

/// Result type for filter evaluation.
pub type FilterResult<T> = Result<T, FilterError>;

/// Coarse classification of [`HiveError`]s for administration callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced entity does not exist (404).
    NotFound,
    /// The entity already exists (409).
    Conflict,
    /// The request itself is invalid (400).
    Invalid,
    /// A failure inside a bee (500).
    Internal,
}

/// Errors returned by hive operations.
#[derive(Debug, Error)]
pub enum HiveError {
    #[error("a bee's name can't be empty")]
    EmptyName,

    #[error("a bee with name {0:?} already exists")]
    NameTaken(String),

    #[error("invalid class specified: {0:?}")]
    UnknownClass(String),

    #[error("bee {bee:?} is missing mandatory option {option:?}")]
    MissingOption { bee: String, option: String },

    #[error("factory {0:?} is already registered")]
    DuplicateFactory(String),

    #[error("bee {0:?} not found")]
    BeeNotFound(String),

    #[error("factory {0:?} not found")]
    FactoryNotFound(String),

    #[error("chain {0:?} not found")]
    ChainNotFound(String),

    #[error("action {0:?} not found")]
    ActionNotFound(String),

    /// A chain or action references something that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error(transparent)]
    Bee(#[from] BeeError),
}

impl HiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BeeNotFound(_)
            | Self::FactoryNotFound(_)
            | Self::ChainNotFound(_)
            | Self::ActionNotFound(_) => ErrorKind::NotFound,
            Self::NameTaken(_) | Self::DuplicateFactory(_) => ErrorKind::Conflict,
            Self::EmptyName
            | Self::UnknownClass(_)
            | Self::MissingOption { .. }
            | Self::InvalidReference(_) => ErrorKind::Invalid,
            Self::Bee(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for hive operations.
pub type HiveResult<T> = Result<T, HiveError>;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
