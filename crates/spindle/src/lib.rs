//! Spindle - an embeddable component composition and lifecycle runtime
//!
//! Applications declare [`Module`]s: bundles of factory bindings, decorators,
//! invokers, and lifecycle services. The [`App`] host flattens the module
//! tree into one duplicate-checked binding table, resolves components lazily
//! as singletons through the [`Container`], and drives every registered
//! start/stop hook through the [`Lifecycle`] coordinator under per-hook
//! timeouts.
//!
//! ```ignore
//! let app = App::builder("demo", "0.1.0")
//!     .module(
//!         Module::new("web")
//!             .public(|| Ok(Clock::system()))
//!             .public(|clock: Arc<Clock>| Ok(Server::new(clock)))
//!             .service(spindle::service!(Server)),
//!     )
//!     .build()?;
//! let exit_code = app.run().await?;
//! ```

mod app;
mod container;
mod error;
pub mod hydrate;
mod key;
mod lifecycle;
mod manifest;
mod module;
mod observer;
mod provider;
mod registry;
pub mod service;
mod shutdown;

pub use app::{App, AppBuilder};
pub use container::{Container, ResolveCx};
pub use error::{Error, Phase, Result};
pub use hydrate::Params;
pub use key::{BindingKey, Tag};
pub use lifecycle::{Hook, Lifecycle, State};
pub use manifest::{Manifest, Timeouts, DEFAULT_TIMEOUT};
pub use module::Module;
pub use observer::{ContainerEvent, Observer, TracingObserver};
pub use provider::{Decorator, Dep, Factory, Group, GroupKey};
pub use service::{Capability, OnStart, OnStop, ServiceDecl};
pub use shutdown::Shutdowner;
