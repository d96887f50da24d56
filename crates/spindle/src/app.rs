//! App host
//!
//! The top-level composition root. `AppBuilder::build` flattens the module
//! tree into one binding table, duplicate-checks the whole flattened set,
//! seeds the container with the coordinator, the manifest, and the
//! shutdowner, and runs every invoker so lifecycle-bearing components exist
//! and their hooks are registered before startup. All composition errors
//! surface here, before `start` is ever attempted - a misconfigured graph
//! must never run.
//!
//! `run` then drives the coordinator and blocks until exactly one
//! termination source fires: an OS signal, cancellation of the ambient
//! token, or an internal [`Shutdowner`] request. The cleanup path runs on a
//! fresh, stop-timeout-bounded sequence regardless of which source won.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::key::BindingKey;
use crate::lifecycle::{Lifecycle, State};
use crate::manifest::{Manifest, Timeouts};
use crate::module::Module;
use crate::observer::{Observer, TracingObserver};
use crate::registry::{AnyArc, BindingTable, InvokerEntry, Visibility};
use crate::shutdown::{self, Shutdowner};

/// Builder for the composition root
pub struct AppBuilder {
    name: String,
    version: String,
    timeouts: Timeouts,
    observer: Arc<dyn Observer>,
    modules: Vec<Module>,
}

impl AppBuilder {
    /// Override the per-hook start timeout
    pub fn start_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeouts.start = timeout;
        self
    }

    /// Override the per-hook stop timeout
    pub fn stop_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeouts.stop = timeout;
        self
    }

    /// Replace the default tracing-backed observer
    pub fn observer(mut self, observer: impl Observer) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Add a root-level module
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Flatten, duplicate-check, seed, and eagerly wire the graph
    pub fn build(self) -> Result<App> {
        let mut manifest = Manifest::new(self.name, &self.version)?;
        manifest.timeouts = self.timeouts;
        let manifest = Arc::new(manifest);

        let lifecycle = Arc::new(Lifecycle::new(self.timeouts, Arc::clone(&self.observer)));
        let (shutdowner, shutdown_rx) = shutdown::channel();
        let shutdowner = Arc::new(shutdowner);

        let mut table = BindingTable::new();
        seed(&mut table, Arc::clone(&manifest))?;
        seed(&mut table, Arc::clone(&lifecycle))?;
        seed(&mut table, Arc::clone(&shutdowner))?;

        let mut invokers: Vec<InvokerEntry> = Vec::new();
        for module in self.modules {
            module.flatten_into("", &mut table, &mut invokers)?;
        }

        let container = Arc::new(Container::new(table, Arc::clone(&self.observer)));
        for invoker in &invokers {
            container.run_invoker(invoker)?;
        }

        tracing::info!(
            application = %manifest.application,
            version = %manifest.version,
            start_timeout = ?manifest.timeouts.start,
            stop_timeout = ?manifest.timeouts.stop,
            "application composed"
        );

        let (done_tx, done_rx) = watch::channel(false);
        Ok(App {
            manifest,
            container,
            lifecycle,
            shutdowner,
            shutdown_rx,
            done_tx: Arc::new(done_tx),
            done_rx,
        })
    }
}

/// A composed application: container, coordinator, and termination plumbing
pub struct App {
    manifest: Arc<Manifest>,
    container: Arc<Container>,
    lifecycle: Arc<Lifecycle>,
    shutdowner: Arc<Shutdowner>,
    shutdown_rx: watch::Receiver<Option<i32>>,
    done_tx: Arc<watch::Sender<bool>>,
    done_rx: watch::Receiver<bool>,
}

impl App {
    /// Start composing an application
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> AppBuilder {
        AppBuilder {
            name: name.into(),
            version: version.into(),
            timeouts: Timeouts::default(),
            observer: Arc::new(TracingObserver),
            modules: Vec::new(),
        }
    }

    /// The application manifest
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The resolver, for pulling components out of the graph
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Resolve the default binding of `T`
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.resolve::<T>()
    }

    /// Handle for requesting shutdown from outside the graph
    pub fn shutdowner(&self) -> Arc<Shutdowner> {
        Arc::clone(&self.shutdowner)
    }

    /// Current coordinator state
    pub fn state(&self) -> State {
        self.lifecycle.state()
    }

    /// Start, then block until a termination source fires, then stop
    ///
    /// Returns the exit code carried by the winning termination source.
    /// Start failures stop whatever did start before the error is returned.
    pub async fn run(&self) -> Result<i32> {
        self.run_until(CancellationToken::new()).await
    }

    /// Like [`run`](App::run), with an ambient cancellation token as an
    /// additional termination source
    pub async fn run_until(&self, cancel: CancellationToken) -> Result<i32> {
        self.start_all().await?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        let code = tokio::select! {
            signal = os_signal() => {
                if let Err(err) = signal {
                    tracing::error!(error = %err, "signal handler failed");
                }
                0
            }
            _ = cancel.cancelled() => 0,
            code = shutdown::requested(&mut shutdown_rx) => code,
        };

        tracing::info!(exit_code = code, "application stopping");
        self.stop_all().await;
        let _ = self.done_tx.send(true);
        Ok(code)
    }

    /// Start without blocking
    ///
    /// Returns an error only for startup failures. Afterwards a background
    /// task waits for the token or a [`Shutdowner`] request, runs the stop
    /// sequence, and signals completion through [`done`](App::done).
    pub async fn start_background(&self, cancel: CancellationToken) -> Result<()> {
        self.start_all().await?;

        let lifecycle = Arc::clone(&self.lifecycle);
        let done_tx = Arc::clone(&self.done_tx);
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = shutdown::requested(&mut shutdown_rx) => {}
            }
            if let Err(err) = lifecycle.stop().await {
                tracing::error!(error = %err, "shutdown reported failures");
            }
            let _ = done_tx.send(true);
        });
        Ok(())
    }

    /// Wait until the application has fully stopped
    pub async fn done(&self) {
        let mut rx = self.done_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn start_all(&self) -> Result<()> {
        match self.lifecycle.start().await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(error = %err, "startup failed, rolling back started components");
                if let Err(stop_err) = self.lifecycle.stop().await {
                    tracing::error!(error = %stop_err, "rollback reported failures");
                }
                Err(err)
            }
        }
    }

    async fn stop_all(&self) {
        if let Err(err) = self.lifecycle.stop().await {
            tracing::error!(error = %err, "shutdown reported failures");
        }
    }
}

fn seed<T: Send + Sync + 'static>(table: &mut BindingTable, value: Arc<T>) -> Result<()> {
    let shared: AnyArc = value;
    table.register(
        BindingKey::of::<T>(),
        Visibility::Public,
        "spindle",
        Box::new(move |_| Ok(Arc::clone(&shared))),
    )
}

#[cfg(unix)]
async fn os_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).map_err(Error::from)?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map_err(Error::from)?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn os_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.map_err(Error::from)
}
