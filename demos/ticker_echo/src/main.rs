//! Ticker / Echo demo
//!
//! Two bee classes wired together by configuration only:
//!
//! - `ticker` emits a `tick` event every `interval` seconds, carrying a
//!   running `count`
//! - `echo` has a `say` action that logs its `text` option
//!
//! `hive.toml` defines one bee of each class, an action that renders
//! `{{.count}}` into the echo text and a chain with a filter that lets
//! the first tick and every tenth one through.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package ticker-echo -- --config demos/ticker_echo/hive.toml
//! ```
//!
//! Send SIGHUP to reload `hive.toml` without restarting the process.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use hive::prelude::*;
use parking_lot::RwLock;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ticker-echo", about = "A ticker bee feeding an echo bee")]
struct Args {
    /// Configuration file to load.
    #[arg(short, long, default_value = "hive.toml")]
    config: PathBuf,

    /// Configuration profile, e.g. "production".
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Ticker
// ============================================================================

struct Ticker {
    interval: RwLock<Duration>,
    count: AtomicI64,
}

#[async_trait]
impl Bee for Ticker {
    async fn run(&self, ctx: RunContext) -> BeeResult<()> {
        loop {
            let interval = *self.interval.read();
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval) => {
                    let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
                    ctx.emit(ctx.event("tick").with("count", "int", count)).await?;
                }
            }
        }
    }

    async fn action(&self, action: &Action) -> BeeResult<Placeholders> {
        match action.name.as_str() {
            "reset" => {
                self.count.store(0, Ordering::Relaxed);
                Ok(Placeholders::new())
            }
            other => Err(BeeError::UnknownAction(other.to_string())),
        }
    }

    fn reload_options(&self, options: &BeeOptions) -> BeeResult<()> {
        *self.interval.write() = Duration::from_secs(options.bind("interval")?);
        Ok(())
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
        "Emits a tick event at a fixed interval"
    }

    fn logo_color(&self) -> &str {
        "#f5a623"
    }

    fn options(&self) -> Vec<BeeOptionDescriptor> {
        vec![
            BeeOptionDescriptor::new("interval", "Seconds between ticks", "int").with_default(1),
        ]
    }

    fn events(&self) -> Vec<EventDescriptor> {
        vec![EventDescriptor {
            namespace: self.id().into(),
            name: "tick".into(),
            description: "The ticker ticked".into(),
            options: vec![PlaceholderDescriptor::new(
                "count",
                "Ticks since the bee started",
                "int",
            )],
        }]
    }

    fn actions(&self) -> Vec<ActionDescriptor> {
        vec![ActionDescriptor {
            namespace: self.id().into(),
            name: "reset".into(),
            description: "Resets the tick counter".into(),
            options: Vec::new(),
        }]
    }

    fn create(&self, config: &BeeConfig, _scope: BeeScope) -> BeeResult<Arc<dyn Bee>> {
        Ok(Arc::new(Ticker {
            interval: RwLock::new(Duration::from_secs(config.options.bind("interval")?)),
            count: AtomicI64::new(0),
        }))
    }
}

// ============================================================================
// Echo
// ============================================================================

struct Echo {
    scope: BeeScope,
}

#[async_trait]
impl Bee for Echo {
    async fn action(&self, action: &Action) -> BeeResult<Placeholders> {
        match action.name.as_str() {
            "say" => {
                let text: String = action.options.bind("text")?;
                info!(bee = %self.scope.name(), "{text}");
                self.scope.log(text);
                Ok(Placeholders::new())
            }
            other => Err(BeeError::UnknownAction(other.to_string())),
        }
    }
}

struct EchoFactory;

impl BeeFactory for EchoFactory {
    fn id(&self) -> &str {
        "echo"
    }

    fn name(&self) -> &str {
        "Echo"
    }

    fn description(&self) -> &str {
        "Logs whatever it is told to say"
    }

    fn actions(&self) -> Vec<ActionDescriptor> {
        vec![ActionDescriptor {
            namespace: self.id().into(),
            name: "say".into(),
            description: "Logs a line of text".into(),
            options: vec![PlaceholderDescriptor::new("text", "What to say", "string")],
        }]
    }

    fn create(&self, _config: &BeeConfig, scope: BeeScope) -> BeeResult<Arc<dyn Bee>> {
        Ok(Arc::new(Echo { scope }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = HiveRuntime::builder().config_file(&args.config);
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    runtime.register_factory(TickerFactory)?;
    runtime.register_factory(EchoFactory)?;

    runtime.run().await?;

    let hive = runtime.hive();
    for message in hive.get_logs("echo").iter().rev().take(3) {
        info!("echo said: {}", message.message);
    }
    Ok(())
}
