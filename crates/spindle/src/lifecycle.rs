//! Lifecycle coordinator
//!
//! Sequences every registered hook's start and stop callbacks under the
//! manifest's timeouts. Start is fail-fast and runs hooks in registration
//! order; stop is best-effort and runs in exact reverse order, aggregating
//! failures instead of aborting. Hooks run strictly one at a time on the
//! coordinating task, so failure attribution is deterministic.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::{Error, Phase, Result};
use crate::manifest::Timeouts;
use crate::observer::{ContainerEvent, Observer};

type HookFn = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No phase has run yet
    Idle,
    /// Start hooks are executing
    Starting,
    /// All start hooks completed
    Running,
    /// Stop hooks are executing
    Stopping,
    /// All stop hooks were attempted without failure
    Stopped,
    /// A phase failed; absorbing
    Failed,
}

/// A start and/or stop callback bound to one constructed instance
pub struct Hook {
    owner: &'static str,
    start: Option<HookFn>,
    stop: Option<HookFn>,
}

impl Hook {
    /// Create an empty hook owned by the named component
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            start: None,
            stop: None,
        }
    }

    /// Attach a start callback
    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.start = Some(Box::new(f));
        self
    }

    /// Attach a stop callback
    pub fn on_stop<F>(mut self, f: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.stop = Some(Box::new(f));
        self
    }

    /// The owning component's type name
    pub fn owner(&self) -> &'static str {
        self.owner
    }
}

struct Inner {
    state: State,
    hooks: Vec<Arc<Hook>>,
    /// How many hook positions the last start pass got through; stop only
    /// rolls back positions before this point
    started: usize,
}

/// The subsystem sequencing all hooks' start/stop calls under timeouts
pub struct Lifecycle {
    timeouts: Timeouts,
    observer: Arc<dyn Observer>,
    inner: Mutex<Inner>,
}

impl Lifecycle {
    pub(crate) fn new(timeouts: Timeouts, observer: Arc<dyn Observer>) -> Self {
        Self {
            timeouts,
            observer,
            inner: Mutex::new(Inner {
                state: State::Idle,
                hooks: Vec::new(),
                started: 0,
            }),
        }
    }

    /// Append a hook; hooks run in registration order on start and in
    /// reverse registration order on stop
    pub fn register(&self, hook: Hook) {
        let owner = hook.owner;
        self.inner.lock().hooks.push(Arc::new(hook));
        self.observer.event(&ContainerEvent::HookRegistered { owner });
    }

    /// Current coordinator state
    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Number of registered hooks
    pub fn hook_count(&self) -> usize {
        self.inner.lock().hooks.len()
    }

    /// Run every start hook in registration order, each bounded by the start
    /// timeout. The first failure or timeout aborts the remainder and leaves
    /// the coordinator in `Failed`.
    pub async fn start(&self) -> Result<()> {
        let hooks = {
            let mut inner = self.inner.lock();
            if inner.state != State::Idle {
                return Err(Error::lifecycle(format!(
                    "start called in state {:?}, expected Idle",
                    inner.state
                )));
            }
            inner.state = State::Starting;
            inner.hooks.clone()
        };
        self.observer
            .event(&ContainerEvent::StateChanged { state: State::Starting });

        for (position, hook) in hooks.iter().enumerate() {
            if let Some(start) = &hook.start {
                self.observer
                    .event(&ContainerEvent::HookStarting { owner: hook.owner });
                let outcome = tokio::time::timeout(self.timeouts.start, start()).await;
                let failure = match outcome {
                    Err(_elapsed) => Some(Error::HookTimedOut {
                        owner: hook.owner,
                        phase: Phase::Start,
                        timeout: self.timeouts.start,
                    }),
                    Ok(Err(err)) => Some(err),
                    Ok(Ok(())) => None,
                };
                if let Some(source) = failure {
                    self.fail(position);
                    return Err(Error::StartHook {
                        owner: hook.owner,
                        source: Box::new(source),
                    });
                }
            }
            self.inner.lock().started = position + 1;
        }

        self.inner.lock().state = State::Running;
        self.observer
            .event(&ContainerEvent::StateChanged { state: State::Running });
        Ok(())
    }

    /// Run the stop hooks of every started position in reverse registration
    /// order, each bounded by the stop timeout. Failures are logged and
    /// aggregated; every remaining hook is still attempted.
    pub async fn stop(&self) -> Result<()> {
        let hooks = {
            let mut inner = self.inner.lock();
            match inner.state {
                State::Running | State::Failed => {}
                State::Idle => {
                    inner.state = State::Stopped;
                    return Ok(());
                }
                State::Stopped => return Ok(()),
                other => {
                    return Err(Error::lifecycle(format!(
                        "stop called in state {other:?}"
                    )));
                }
            }
            inner.state = State::Stopping;
            let started = inner.started;
            inner.hooks[..started].to_vec()
        };
        self.observer
            .event(&ContainerEvent::StateChanged { state: State::Stopping });

        let mut failures = Vec::new();
        for hook in hooks.iter().rev() {
            if let Some(stop) = &hook.stop {
                self.observer
                    .event(&ContainerEvent::HookStopping { owner: hook.owner });
                let outcome = tokio::time::timeout(self.timeouts.stop, stop()).await;
                let failure = match outcome {
                    Err(_elapsed) => Some(Error::HookTimedOut {
                        owner: hook.owner,
                        phase: Phase::Stop,
                        timeout: self.timeouts.stop,
                    }),
                    Ok(Err(err)) => Some(err),
                    Ok(Ok(())) => None,
                };
                if let Some(err) = failure {
                    tracing::error!(owner = hook.owner, error = %err, "stop hook failed");
                    failures.push(err);
                }
            }
        }

        let final_state = if failures.is_empty() {
            State::Stopped
        } else {
            State::Failed
        };
        {
            let mut inner = self.inner.lock();
            inner.state = final_state;
            // A completed stop pass consumed every started position; a later
            // stop call must not rerun the hooks.
            inner.started = 0;
        }
        self.observer
            .event(&ContainerEvent::StateChanged { state: final_state });

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::StopHooks { failures })
        }
    }

    fn fail(&self, started: usize) {
        let mut inner = self.inner.lock();
        inner.state = State::Failed;
        inner.started = started;
        drop(inner);
        self.observer
            .event(&ContainerEvent::StateChanged { state: State::Failed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TracingObserver;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn coordinator(timeouts: Timeouts) -> Lifecycle {
        Lifecycle::new(timeouts, Arc::new(TracingObserver))
    }

    fn counting_hook(owner: &'static str, counter: Arc<AtomicUsize>) -> Hook {
        Hook::new(owner).on_start(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn start_runs_hooks_once_in_order() {
        let lifecycle = coordinator(Timeouts::default());
        let counter = Arc::new(AtomicUsize::new(0));
        lifecycle.register(counting_hook("a", Arc::clone(&counter)));
        lifecycle.register(counting_hook("b", Arc::clone(&counter)));

        lifecycle.start().await.unwrap();
        assert_eq!(lifecycle.state(), State::Running);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let lifecycle = coordinator(Timeouts::default());
        lifecycle.start().await.unwrap();
        assert!(lifecycle.start().await.is_err());
    }

    #[tokio::test]
    async fn slow_start_hook_times_out() {
        let lifecycle = coordinator(Timeouts {
            start: Duration::from_millis(20),
            stop: Duration::from_millis(20),
        });
        lifecycle.register(Hook::new("slow").on_start(|| {
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
            .boxed()
        }));

        let err = lifecycle.start().await.unwrap_err();
        match err {
            Error::StartHook { owner, source } => {
                assert_eq!(owner, "slow");
                assert!(matches!(*source, Error::HookTimedOut { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(lifecycle.state(), State::Failed);
    }

    #[tokio::test]
    async fn stop_failures_are_aggregated_not_fatal() {
        let lifecycle = coordinator(Timeouts::default());
        let stopped = Arc::new(AtomicUsize::new(0));
        lifecycle.register(Hook::new("fails").on_stop(|| {
            async { Err(Error::lifecycle("boom")) }.boxed()
        }));
        let counter = Arc::clone(&stopped);
        lifecycle.register(Hook::new("succeeds").on_stop(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }));

        lifecycle.start().await.unwrap();
        let err = lifecycle.stop().await.unwrap_err();
        match err {
            Error::StopHooks { failures } => assert_eq!(failures.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        // The earlier-registered failing hook still ran after the successful
        // one; its failure did not abort the sequence.
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_stop_does_not_rerun_hooks() {
        let lifecycle = coordinator(Timeouts::default());
        let stops = Arc::new(AtomicUsize::new(0));
        lifecycle.register(
            Hook::new("fails").on_stop(|| async { Err(Error::lifecycle("boom")) }.boxed()),
        );
        let counter = Arc::clone(&stops);
        lifecycle.register(Hook::new("counts").on_stop(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }));

        lifecycle.start().await.unwrap();
        assert!(lifecycle.stop().await.is_err());
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        // The first pass already attempted every hook, even though it ended
        // in Failed; a second stop has nothing left to do.
        lifecycle.stop().await.unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.state(), State::Stopped);
    }
}
