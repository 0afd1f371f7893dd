//! Hive Runtime - configuration, logging and process lifecycle.
//!
//! This crate provides:
//! - [`config`]: figment-based loading and validation of [`HiveConfig`]
//! - [`logging`]: `tracing-subscriber` initialization from `[logging]`
//! - [`HiveRuntime`]: runs a [`Hive`](hive_framework::Hive) until shutdown,
//!   reloading the configuration on SIGHUP
//!
//! ```rust,ignore
//! use hive_runtime::HiveRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HiveRuntime::builder().config_file("hive.toml").build()?;
//!     runtime.register_factory(TickerFactory)?;
//!     runtime.register_factory(EchoFactory)?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, HiveConfig, LoggingConfig, LogsConfig,
    validate_config,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HiveRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for bee implementations.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
