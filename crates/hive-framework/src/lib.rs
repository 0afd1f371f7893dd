//! # Hive Framework
//!
//! Supervision and orchestration on top of [`hive_core`].
//!
//! This layer provides:
//! - [`BeeHandle`]: one supervised bee with bounded crash-restart
//! - [`FactoryRegistry`] / [`BeeRegistry`]: the shared name-keyed tables
//! - [`EventDispatcher`]: the single consumer of the event bus
//! - [`ChainEngine`]: chain matching, filters and action execution
//! - [`template`] and [`filter`]: the template language used by options and filters
//! - [`Hive`]: all of the above behind one administration API

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hive;
pub mod registry;
pub mod supervisor;
pub mod template;

pub use dispatcher::{EventDispatcher, MAX_LOGGED_VALUE, truncate_string};
pub use engine::{ChainEngine, ChainOutcome, render_action};
pub use error::{
    ErrorKind, FilterError, FilterResult, HiveError, HiveResult, TemplateError, TemplateResult,
};
pub use filter::{FilterEvaluator, FilterKind, FilterRegistry, TemplateFilter};
pub use hive::Hive;
pub use registry::{BeeRegistry, FactoryRegistry, RegistryStats};
pub use supervisor::{BeeHandle, BeeState, MAX_RESTARTS, RESTART_DELAY};
pub use template::Template;
