//! Capability-based lifecycle registrar
//!
//! A component opts into the lifecycle by implementing [`OnStart`],
//! [`OnStop`], or both. The [`service!`](crate::service!) macro classifies a
//! declared type once, at wiring time and with no instance in hand, into a
//! [`Capability`] - checking both contracts first, then start-only, then
//! stop-only. A type implementing neither contract is recorded as
//! `Capability::None` and rejected when the app host composes the graph,
//! before any hook can run.
//!
//! A matched declaration emits exactly one decorator (it registers the hook
//! with the coordinator once the real instance is built) and one invoker
//! (it forces eager resolution, so a lifecycle-bearing component is never
//! lazily skipped merely because nothing depends on it).

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::{Error, Result};
use crate::lifecycle::{Hook, Lifecycle};
use crate::provider::Dep;
use crate::registry::{AnyArc, DecorateFn, InvokeFn};

/// Start-phase lifecycle contract
#[async_trait]
pub trait OnStart: Send + Sync + 'static {
    /// Called once during startup, in registration order, under the start
    /// timeout. Returning an error aborts the remaining startup sequence.
    async fn on_start(&self) -> Result<()>;
}

/// Stop-phase lifecycle contract
#[async_trait]
pub trait OnStop: Send + Sync + 'static {
    /// Called once during shutdown, in reverse registration order, under the
    /// stop timeout. Errors are aggregated but never abort shutdown.
    async fn on_stop(&self) -> Result<()>;
}

/// The lifecycle contract set a declared service satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Neither contract; rejected at composition time
    None,
    /// `OnStart` only
    StartOnly,
    /// `OnStop` only
    StopOnly,
    /// Both `OnStart` and `OnStop`
    Both,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::None => write!(f, "none"),
            Capability::StartOnly => write!(f, "start-only"),
            Capability::StopOnly => write!(f, "stop-only"),
            Capability::Both => write!(f, "start+stop"),
        }
    }
}

/// A classified service declaration, produced by [`service!`](crate::service!)
///
/// Pass it to [`Module::service`](crate::Module::service).
pub struct ServiceDecl {
    pub(crate) type_name: &'static str,
    pub(crate) capability: Capability,
    pub(crate) hook: Option<(TypeId, DecorateFn)>,
    pub(crate) invoke: Option<InvokeFn>,
}

impl ServiceDecl {
    /// The declared type's name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The detected capability set
    pub fn capability(&self) -> Capability {
        self.capability
    }
}

fn downcast<T: Send + Sync + 'static>(instance: AnyArc, type_name: &'static str) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| Error::lifecycle(format!("internal: service decorator type mismatch for `{type_name}`")))
}

fn availability_invoker<T: Send + Sync + 'static>(type_name: &'static str) -> InvokeFn {
    Box::new(move |cx| {
        let _service: Arc<T> = <Arc<T> as Dep>::resolve(cx)?;
        tracing::info!(service = type_name, "service available");
        Ok(())
    })
}

fn decl_both<T: OnStart + OnStop>() -> ServiceDecl {
    let type_name = std::any::type_name::<T>();
    let apply: DecorateFn = Box::new(move |instance, cx| {
        let typed = downcast::<T>(instance, type_name)?;
        let lifecycle: Arc<Lifecycle> = <Arc<Lifecycle> as Dep>::resolve(cx)?;
        let on_start = Arc::clone(&typed);
        let on_stop = Arc::clone(&typed);
        lifecycle.register(
            Hook::new(type_name)
                .on_start(move || {
                    let service = Arc::clone(&on_start);
                    async move { service.on_start().await }.boxed()
                })
                .on_stop(move || {
                    let service = Arc::clone(&on_stop);
                    async move { service.on_stop().await }.boxed()
                }),
        );
        Ok(typed as AnyArc)
    });
    ServiceDecl {
        type_name,
        capability: Capability::Both,
        hook: Some((TypeId::of::<T>(), apply)),
        invoke: Some(availability_invoker::<T>(type_name)),
    }
}

fn decl_start<T: OnStart>() -> ServiceDecl {
    let type_name = std::any::type_name::<T>();
    let apply: DecorateFn = Box::new(move |instance, cx| {
        let typed = downcast::<T>(instance, type_name)?;
        let lifecycle: Arc<Lifecycle> = <Arc<Lifecycle> as Dep>::resolve(cx)?;
        let on_start = Arc::clone(&typed);
        lifecycle.register(Hook::new(type_name).on_start(move || {
            let service = Arc::clone(&on_start);
            async move { service.on_start().await }.boxed()
        }));
        Ok(typed as AnyArc)
    });
    ServiceDecl {
        type_name,
        capability: Capability::StartOnly,
        hook: Some((TypeId::of::<T>(), apply)),
        invoke: Some(availability_invoker::<T>(type_name)),
    }
}

fn decl_stop<T: OnStop>() -> ServiceDecl {
    let type_name = std::any::type_name::<T>();
    let apply: DecorateFn = Box::new(move |instance, cx| {
        let typed = downcast::<T>(instance, type_name)?;
        let lifecycle: Arc<Lifecycle> = <Arc<Lifecycle> as Dep>::resolve(cx)?;
        let on_stop = Arc::clone(&typed);
        lifecycle.register(Hook::new(type_name).on_stop(move || {
            let service = Arc::clone(&on_stop);
            async move { service.on_stop().await }.boxed()
        }));
        Ok(typed as AnyArc)
    });
    ServiceDecl {
        type_name,
        capability: Capability::StopOnly,
        hook: Some((TypeId::of::<T>(), apply)),
        invoke: Some(availability_invoker::<T>(type_name)),
    }
}

/// Capability detection probes backing the [`service!`](crate::service!)
/// macro. Method resolution on a `&&&Probe<T>` receiver tries self types in
/// the order `&&&Probe` (both), `&&Probe` (start-only), `&Probe` (stop-only),
/// `Probe` (none); each probe only exists where its trait bounds hold, so the
/// first match is the strongest capability the type satisfies.
#[doc(hidden)]
pub mod probe {
    use super::*;
    use std::marker::PhantomData;

    pub struct Probe<T>(PhantomData<T>);

    impl<T> Clone for Probe<T> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<T> Copy for Probe<T> {}

    impl<T> Probe<T> {
        #[allow(clippy::new_without_default)]
        pub fn new() -> Self {
            Probe(PhantomData)
        }
    }

    pub trait BothKind {
        fn decl(&self) -> ServiceDecl;
    }

    impl<T: OnStart + OnStop> BothKind for &&Probe<T> {
        fn decl(&self) -> ServiceDecl {
            decl_both::<T>()
        }
    }

    pub trait StartKind {
        fn decl(&self) -> ServiceDecl;
    }

    impl<T: OnStart> StartKind for &Probe<T> {
        fn decl(&self) -> ServiceDecl {
            decl_start::<T>()
        }
    }

    pub trait StopKind {
        fn decl(&self) -> ServiceDecl;
    }

    impl<T: OnStop> StopKind for Probe<T> {
        fn decl(&self) -> ServiceDecl {
            decl_stop::<T>()
        }
    }

    pub trait NoneKind {
        fn decl(self) -> ServiceDecl;
    }

    impl<T> NoneKind for Probe<T> {
        fn decl(self) -> ServiceDecl {
            ServiceDecl {
                type_name: std::any::type_name::<T>(),
                capability: Capability::None,
                hook: None,
                invoke: None,
            }
        }
    }
}

/// Classify a type's lifecycle capability and produce a [`ServiceDecl`]
///
/// ```ignore
/// let module = Module::new("web")
///     .public(|clock: Arc<Clock>| Ok(Server::new(clock)))
///     .service(spindle::service!(Server));
/// ```
#[macro_export]
macro_rules! service {
    ($ty:ty) => {{
        #[allow(unused_imports)]
        use $crate::service::probe::{
            BothKind as _, NoneKind as _, StartKind as _, StopKind as _,
        };
        (&&&$crate::service::probe::Probe::<$ty>::new()).decl()
    }};
}
