//! # Hive
//!
//! An event-driven automation hub. Integrations ("bees") publish events,
//! user-defined chains match them, run filters over their data and trigger
//! actions on other bees.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ emit  ┌─────────┐     ┌────────────┐     ┌──────────────┐ action ┌──────────┐
//! │ Bee run  │──────▶│   Bus   │────▶│ Dispatcher │────▶│ Chain engine │───────▶│ Bee      │
//! │  loops   │       │ (mpsc)  │     │ (one task) │     │ filters+tmpl │        │ handlers │
//! └──────────┘       └─────────┘     └────────────┘     └──────────────┘        └──────────┘
//! ```
//!
//! - **Core** ([`core`]): values, placeholders, events, actions, chains and the bee traits
//! - **Framework** ([`framework`]): supervision, registries, templates, filters, the [`Hive`]
//! - **Runtime** ([`runtime`]): configuration, logging and signal handling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hive::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HiveRuntime::builder().config_file("hive.toml").build()?;
//!     runtime.register_factory(TickerFactory)?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use hive_core as core;
pub use hive_framework as framework;
pub use hive_runtime as runtime;

pub use hive_framework::Hive;
pub use hive_runtime::HiveRuntime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hive::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hive_runtime::{HiveConfig, HiveRuntime, RuntimeError, RuntimeResult};

    // Administration
    pub use hive_framework::{BeeHandle, BeeState, Hive, HiveError, HiveResult};

    // Implementing bees
    pub use hive_core::{
        Action, ActionDescriptor, Bee, BeeConfig, BeeError, BeeFactory, BeeOptionDescriptor,
        BeeOptions, BeeResult, BeeScope, Event, EventDescriptor, PlaceholderDescriptor,
        Placeholders, RunContext, Value,
    };

    // Orchestration data
    pub use hive_core::{Chain, EventPattern, HiveManifest};
}
