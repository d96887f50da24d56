//! Container diagnostics
//!
//! The resolver and the lifecycle coordinator report what they do through an
//! explicit [`Observer`] dependency instead of ambient global state. The
//! default observer forwards everything to `tracing`; tests can inject a
//! recording observer to assert on ordering.

use crate::lifecycle::State;

/// A diagnostic event emitted by the container or the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    /// A singleton was constructed, decorated, and cached
    Resolved {
        /// Display form of the binding key
        key: String,
        /// Module path of the declaring binding
        module: String,
    },
    /// A decorator ran against a freshly built instance
    Decorated {
        /// Type name of the intercepted instance
        type_name: &'static str,
    },
    /// A lifecycle hook was appended to the coordinator
    HookRegistered {
        /// Type name owning the hook
        owner: &'static str,
    },
    /// A hook's start function is about to run
    HookStarting {
        /// Type name owning the hook
        owner: &'static str,
    },
    /// A hook's stop function is about to run
    HookStopping {
        /// Type name owning the hook
        owner: &'static str,
    },
    /// The coordinator changed state
    StateChanged {
        /// The new coordinator state
        state: State,
    },
}

/// Receiver for container diagnostics
pub trait Observer: Send + Sync + 'static {
    /// Handle one diagnostic event
    fn event(&self, event: &ContainerEvent);
}

/// Default observer, forwarding events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn event(&self, event: &ContainerEvent) {
        match event {
            ContainerEvent::Resolved { key, module } => {
                tracing::debug!(%key, %module, "component resolved");
            }
            ContainerEvent::Decorated { type_name } => {
                tracing::debug!(type_name, "decorator applied");
            }
            ContainerEvent::HookRegistered { owner } => {
                tracing::debug!(owner, "lifecycle hook registered");
            }
            ContainerEvent::HookStarting { owner } => {
                tracing::info!(owner, "starting");
            }
            ContainerEvent::HookStopping { owner } => {
                tracing::info!(owner, "stopping");
            }
            ContainerEvent::StateChanged { state } => {
                tracing::debug!(?state, "lifecycle state changed");
            }
        }
    }
}
