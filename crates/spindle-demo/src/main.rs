//! Demo application for the spindle runtime.
//!
//! Composes a small graph - a clock, a ticker service, and the runtime's own
//! shutdowner - and runs it until the ticker finishes or the process receives
//! a termination signal. Exercises factories, lifecycle services, and
//! self-initiated shutdown end to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::Parser;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use spindle::{App, Error, Module, OnStart, OnStop, Result, Shutdowner};

#[derive(Parser)]
#[command(name = "spindle-demo", version, about = "Tick a few times, then shut down cleanly")]
struct Args {
    /// Number of ticks before the demo requests its own shutdown
    #[arg(long, default_value_t = 5)]
    ticks: u64,

    /// Interval between ticks, e.g. `500ms` or `2s`
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Bound on each component's start hook
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    start_timeout: Duration,

    /// Bound on each component's stop hook
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    stop_timeout: Duration,
}

struct TickConfig {
    ticks: u64,
    interval: Duration,
}

struct Clock;

impl Clock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Emits a log line per tick, then asks the host to shut the process down.
struct Ticker {
    config: Arc<TickConfig>,
    clock: Arc<Clock>,
    shutdowner: Arc<Shutdowner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl OnStart for Ticker {
    async fn on_start(&self) -> Result<()> {
        let ticks = self.config.ticks;
        let interval = self.config.interval;
        let clock = Arc::clone(&self.clock);
        let shutdowner = Arc::clone(&self.shutdowner);
        let task = tokio::spawn(async move {
            for tick in 1..=ticks {
                tokio::time::sleep(interval).await;
                tracing::info!(tick, now = %clock.now(), "tick");
            }
            tracing::info!("all ticks emitted, requesting shutdown");
            shutdowner.shutdown();
        });
        *self.task.lock() = Some(task);
        Ok(())
    }
}

#[async_trait]
impl OnStop for Ticker {
    async fn on_stop(&self) -> Result<()> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        Ok(())
    }
}

fn demo_module(args: &Args) -> Module {
    Module::new("demo")
        .supply(TickConfig {
            ticks: args.ticks,
            interval: args.interval,
        })
        .public(|| Ok(Clock))
        .public(
            |config: Arc<TickConfig>, clock: Arc<Clock>, shutdowner: Arc<Shutdowner>| {
                if config.ticks == 0 {
                    return Err(Error::factory::<Ticker>("tick count must be at least 1"));
                }
                Ok(Ticker {
                    config,
                    clock,
                    shutdowner,
                    task: Mutex::new(None),
                })
            },
        )
        .service(spindle::service!(Ticker))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let app = App::builder("spindle-demo", env!("CARGO_PKG_VERSION"))
        .start_timeout(args.start_timeout)
        .stop_timeout(args.stop_timeout)
        .module(demo_module(&args))
        .build()?;

    let code = app.run().await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
