//! Hive Core - data model and plugin capabilities.
//!
//! This crate defines everything a bee implementation needs and nothing
//! about how bees are supervised:
//!
//! - [`Value`], [`FromValue`]: loosely typed values and their coercion
//! - [`Placeholders`], [`BeeOptions`]: named values for events, actions and configuration
//! - [`Event`], [`Action`], [`Chain`]: the orchestration data model
//! - [`Bee`], [`BeeFactory`]: the capability set of an integration
//! - [`EventBus`], [`EventSink`]: the rendezvous channel into the dispatcher
//! - [`LogStore`], [`ContextStore`]: per-bee telemetry and state

pub mod action;
pub mod bee;
pub mod bus;
pub mod chain;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod logs;
pub mod placeholder;
pub mod value;

use serde::{Deserialize, Serialize};

pub use action::{Action, new_id};
pub use bee::{Bee, BeeConfig, BeeFactory, BeeScope, RunContext};
pub use bus::{EventBus, EventReceiver, EventSink};
pub use chain::{Chain, ChainElement, ElementFilter};
pub use context::ContextStore;
pub use descriptor::{
    ActionDescriptor, BeeOptionDescriptor, EventDescriptor, PlaceholderDescriptor,
    complete_options,
};
pub use error::{BeeError, BeeResult, BindError, BindResult};
pub use event::{Event, EventPattern};
pub use logs::{DEFAULT_LOG_CAPACITY, LogMessage, LogStore, Severity};
pub use placeholder::{BeeOption, BeeOptions, Placeholder, Placeholders};
pub use value::{BinaryValue, FromValue, QueryValues, Value, ValueMap};

/// The complete user configuration of a hive: bees, actions and chains.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HiveManifest {
    #[serde(default)]
    pub bees: Vec<BeeConfig>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub chains: Vec<Chain>,
}
