//! Main runtime orchestration.
//!
//! [`HiveRuntime`] ties a [`Hive`] to its configuration: it installs logging,
//! applies the configured actions and chains, starts the configured bees and
//! reacts to process signals until shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hive_runtime::HiveRuntime;
//!
//! // Auto-loads hive.toml from the current directory
//! let runtime = HiveRuntime::new();
//! runtime.register_factory(TickerFactory)?;
//! runtime.run().await?;
//!
//! // Explicit file and profile
//! let runtime = HiveRuntime::builder()
//!     .config_file("config/hive.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use figment::Provider;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use hive_core::BeeFactory;
use hive_framework::{FilterEvaluator, Hive, RegistryStats};

use crate::config::{ConfigLoader, ConfigResult, HiveConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// What a received process signal asks the runtime to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    Shutdown,
    Reload,
}

/// The Hive runtime: configuration, logging and signal handling around a [`Hive`].
pub struct HiveRuntime {
    config: RwLock<HiveConfig>,
    /// Sources re-read on reload; `None` when built from a ready config.
    loader: Option<ConfigLoader>,
    hive: Arc<Hive>,
    running: RwLock<bool>,
}

impl HiveRuntime {
    /// Creates a runtime from `hive.toml` in the current directory.
    ///
    /// Falls back to the default configuration when loading or validation
    /// fails.
    pub fn new() -> Self {
        let loader = ConfigLoader::new().with_current_dir();
        let config = loader
            .load()
            .and_then(|config| validate_config(&config).map(|()| config))
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                HiveConfig::default()
            });

        Self::with_loader(config, Some(loader))
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Reloading such a runtime re-applies this configuration.
    pub fn from_config(config: HiveConfig) -> Self {
        Self::with_loader(config, None)
    }

    fn with_loader(config: HiveConfig, loader: Option<ConfigLoader>) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            log_capacity = config.logs.capacity,
            "Runtime initialized from configuration"
        );

        Self {
            hive: Arc::new(Hive::with_log_capacity(config.logs.capacity)),
            config: RwLock::new(config),
            loader,
            running: RwLock::new(false),
        }
    }

    /// The hive, for administration calls.
    pub fn hive(&self) -> &Arc<Hive> {
        &self.hive
    }

    /// A snapshot of the active configuration.
    pub async fn config(&self) -> HiveConfig {
        self.config.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub fn stats(&self) -> RegistryStats {
        self.hive.stats()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a bee class. Do this before [`start`](Self::start) so the
    /// configured bees of that class can be created.
    pub fn register_factory<F: BeeFactory>(&self, factory: F) -> RuntimeResult<()> {
        self.hive.register_factory(Arc::new(factory))?;
        Ok(())
    }

    /// Installs an additional filter evaluator.
    pub fn register_filter(&self, evaluator: Arc<dyn FilterEvaluator>) {
        self.hive.register_filter(evaluator);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Applies the configured actions and chains, then starts the configured bees.
    pub async fn start(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Runtime is already running");
                return Ok(());
            }
            *running = true;
        }

        info!("Starting Hive runtime");
        let config = self.config.read().await;
        self.apply(&config).await;
        info!(stats = %self.hive.stats(), "Runtime started");

        Ok(())
    }

    /// Stops every bee and the event bus.
    pub async fn stop(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if !*running {
                warn!("Runtime is not running");
                return Ok(());
            }
            *running = false;
        }

        info!("Stopping Hive runtime");
        self.hive.stop_all().await;
        info!("Runtime stopped");

        Ok(())
    }

    /// Re-reads the configuration and restarts every bee with it.
    ///
    /// A configuration that fails to load or validate is rejected and the
    /// running bees are left untouched. Logging and the log ring size keep
    /// the values they were created with.
    pub async fn reload(&self) -> RuntimeResult<()> {
        let config = match &self.loader {
            Some(loader) => loader.load()?,
            None => self.config.read().await.clone(),
        };
        validate_config(&config)?;

        info!(
            bees = config.bees.len(),
            actions = config.actions.len(),
            chains = config.chains.len(),
            "Reloading configuration"
        );

        let mut current = self.config.write().await;
        if config.logs.capacity != current.logs.capacity {
            warn!(
                configured = config.logs.capacity,
                active = current.logs.capacity,
                "Log capacity changes take effect after a restart"
            );
        }

        self.hive.stop_all().await;
        if *self.running.read().await {
            self.apply(&config).await;
        }
        *current = config;

        info!(stats = %self.hive.stats(), "Configuration reloaded");
        Ok(())
    }

    async fn apply(&self, config: &HiveConfig) {
        self.hive.set_actions(config.actions.clone());
        self.hive.set_chains(config.chains.clone());
        self.hive.start_all(&config.bees).await;
    }

    /// Runs until Ctrl+C or SIGTERM. SIGHUP reloads the configuration.
    pub async fn run(&self) -> RuntimeResult<()> {
        let mut signals = Signals::new()?;

        self.start().await?;
        info!("Hive runtime is now running. Press Ctrl+C to stop.");

        loop {
            match signals.recv().await? {
                SignalAction::Shutdown => break,
                SignalAction::Reload => {
                    if let Err(e) = self.reload().await {
                        error!(error = %e, "Reload failed, keeping the current configuration");
                    }
                }
            }
        }

        self.stop().await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }
}

impl Default for HiveRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Signals
// =============================================================================

struct Signals {
    #[cfg(unix)]
    terminate: signal::unix::Signal,
    #[cfg(unix)]
    hangup: signal::unix::Signal,
}

impl Signals {
    #[cfg(unix)]
    fn new() -> RuntimeResult<Self> {
        use signal::unix::{SignalKind, signal};

        Ok(Self {
            terminate: signal(SignalKind::terminate()).map_err(RuntimeError::Signal)?,
            hangup: signal(SignalKind::hangup()).map_err(RuntimeError::Signal)?,
        })
    }

    #[cfg(not(unix))]
    fn new() -> RuntimeResult<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> RuntimeResult<SignalAction> {
        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
                Ok(SignalAction::Shutdown)
            }
            _ = self.terminate.recv() => {
                info!("Received SIGTERM, shutting down");
                Ok(SignalAction::Shutdown)
            }
            _ = self.hangup.recv() => {
                info!("Received SIGHUP, reloading");
                Ok(SignalAction::Reload)
            }
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> RuntimeResult<SignalAction> {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
        Ok(SignalAction::Shutdown)
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`HiveRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, provider: impl Provider) -> Self {
        self.config_loader = self.config_loader.merge(provider);
        self
    }

    /// Loads and validates the configuration, then builds the runtime.
    pub fn build(self) -> ConfigResult<HiveRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(HiveRuntime::with_loader(config, Some(self.config_loader)))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use hive_core::{
        Action, Bee, BeeConfig, BeeError, BeeResult, BeeScope, Chain, EventPattern,
        Placeholders, RunContext,
    };
    use parking_lot::Mutex;

    use crate::config::ConfigError;

    /// Emits a single `tick` when started.
    struct Ticker;

    #[async_trait]
    impl Bee for Ticker {
        async fn run(&self, ctx: RunContext) -> BeeResult<()> {
            ctx.emit(ctx.event("tick").with("count", "int", 1)).await?;
            ctx.cancelled().await;
            Ok(())
        }

        async fn action(&self, action: &Action) -> BeeResult<Placeholders> {
            Err(BeeError::UnknownAction(action.name.clone()))
        }
    }

    struct TickerFactory;

    impl BeeFactory for TickerFactory {
        fn id(&self) -> &str {
            "ticker"
        }

        fn name(&self) -> &str {
            "Ticker"
        }

        fn description(&self) -> &str {
            "Ticks once"
        }

        fn create(&self, _config: &BeeConfig, _scope: BeeScope) -> BeeResult<Arc<dyn Bee>> {
            Ok(Arc::new(Ticker))
        }
    }

    #[derive(Default)]
    struct Echo {
        said: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Bee for Echo {
        async fn action(&self, action: &Action) -> BeeResult<Placeholders> {
            self.said.lock().push(action.options.bind("text")?);
            Ok(Placeholders::new())
        }
    }

    #[derive(Default)]
    struct EchoFactory {
        said: Arc<Mutex<Vec<String>>>,
        created: Arc<AtomicUsize>,
    }

    impl BeeFactory for EchoFactory {
        fn id(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "Echo"
        }

        fn description(&self) -> &str {
            "Repeats text"
        }

        fn create(&self, _config: &BeeConfig, _scope: BeeScope) -> BeeResult<Arc<dyn Bee>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Echo {
                said: self.said.clone(),
            }))
        }
    }

    fn config() -> HiveConfig {
        let mut say = Action::new("echo", "say").with_id("say-tick");
        say.options.set_value("text", "string", "tick {{.count}}");

        HiveConfig {
            bees: vec![BeeConfig::new("ticker", "ticker"), BeeConfig::new("echo", "echo")],
            actions: vec![say],
            chains: vec![
                Chain::new("echo-ticks", EventPattern::new("ticker", "tick")).with_action("say-tick"),
            ],
            ..Default::default()
        }
    }

    async fn wait_for(said: &Mutex<Vec<String>>) -> Vec<String> {
        for _ in 0..200 {
            if !said.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        said.lock().clone()
    }

    #[tokio::test]
    async fn test_runtime_lifecycle() {
        let runtime = HiveRuntime::from_config(config());
        let echo = EchoFactory::default();
        let said = echo.said.clone();
        runtime.register_factory(TickerFactory).unwrap();
        runtime.register_factory(echo).unwrap();

        runtime.start().await.unwrap();
        assert!(runtime.is_running().await);
        assert_eq!(runtime.stats().running, 2);
        assert_eq!(wait_for(&said).await, vec!["tick 1"]);

        // A second start is a no-op.
        runtime.start().await.unwrap();
        assert_eq!(runtime.stats().total, 2);

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running().await);
        assert_eq!(runtime.stats().total, 0);
    }

    #[tokio::test]
    async fn test_run_until() {
        let runtime = HiveRuntime::from_config(config());
        runtime.register_factory(TickerFactory).unwrap();
        runtime.register_factory(EchoFactory::default()).unwrap();

        runtime
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(!runtime.is_running().await);
        assert!(runtime.hive().list_bees().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_factory() {
        let runtime = HiveRuntime::from_config(HiveConfig::default());
        runtime.register_factory(TickerFactory).unwrap();
        assert!(matches!(
            runtime.register_factory(TickerFactory),
            Err(RuntimeError::Hive(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("hive.toml");
        std::fs::write(&path, "[[bees]]\nname = \"echo\"\nclass = \"echo\"\n").unwrap();

        let runtime = HiveRuntime::builder()
            .config_file(&path)
            .without_env()
            .build()
            .unwrap();
        let echo = EchoFactory::default();
        let created = echo.created.clone();
        runtime.register_factory(echo).unwrap();
        runtime.start().await.unwrap();
        assert_eq!(runtime.stats().total, 1);

        std::fs::write(
            &path,
            "[[bees]]\nname = \"echo\"\nclass = \"echo\"\n\n[[bees]]\nname = \"echo2\"\nclass = \"echo\"\n",
        )
        .unwrap();
        runtime.reload().await.unwrap();
        assert_eq!(runtime.stats().total, 2);
        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(runtime.config().await.bees.len(), 2);

        // An invalid file is rejected and the running bees stay up.
        std::fs::write(
            &path,
            "[[bees]]\nname = \"echo\"\nclass = \"echo\"\n\n[[bees]]\nname = \"echo\"\nclass = \"echo\"\n",
        )
        .unwrap();
        assert!(matches!(
            runtime.reload().await,
            Err(RuntimeError::Config(ConfigError::DuplicateBee(_)))
        ));
        assert_eq!(runtime.stats().total, 2);

        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("hive.toml");
        std::fs::write(
            &path,
            "[[chains]]\nname = \"c\"\nevent = { bee = \"a\", name = \"b\" }\nactions = [\"missing\"]\n",
        )
        .unwrap();

        let result = HiveRuntime::builder().config_file(&path).without_env().build();
        assert!(matches!(result, Err(ConfigError::UnknownAction { .. })));
    }
}
