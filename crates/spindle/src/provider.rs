//! Factory and dependency traits
//!
//! Bindings are registered as plain closures. Each closure parameter is a
//! [`Dep`]: a description of how the container should satisfy it. The
//! supported parameter shapes are:
//!
//! - `Arc<T>` - required singleton; resolution fails when no binding exists
//! - `Option<Arc<T>>` - optional singleton; `None` when no binding exists
//! - [`Group<K>`] - every binding registered under a named group, in
//!   registration order
//!
//! A factory whose single parameter implements [`Params`](crate::Params) is
//! hydrated field-by-field instead; see the [`hydrate`](crate::hydrate)
//! module. Ordinary multi-argument factories pass through that machinery
//! behaviorally unchanged.

use std::sync::Arc;

use crate::container::ResolveCx;
use crate::error::Result;
use crate::hydrate::Params;

/// A value the container knows how to supply to a factory parameter
pub trait Dep: Sized + Send + 'static {
    /// Resolve this dependency through the given resolution context
    fn resolve(cx: &mut ResolveCx<'_>) -> Result<Self>;
}

impl<T: Send + Sync + 'static> Dep for Arc<T> {
    fn resolve(cx: &mut ResolveCx<'_>) -> Result<Self> {
        cx.resolve::<T>()
    }
}

impl<T: Send + Sync + 'static> Dep for Option<Arc<T>> {
    fn resolve(cx: &mut ResolveCx<'_>) -> Result<Self> {
        cx.resolve_optional::<T>()
    }
}

/// Compile-time name of a binding group, for consumption in factories
///
/// ```ignore
/// struct Routes;
/// impl GroupKey for Routes {
///     type Value = Route;
///     const NAME: &'static str = "http.routes";
/// }
///
/// let module = Module::new("web")
///     .public(|routes: Group<Routes>| Ok(Router::new(routes.0)));
/// ```
pub trait GroupKey: 'static {
    /// The type every member of the group produces
    type Value: Send + Sync + 'static;
    /// The group's registration name
    const NAME: &'static str;
}

/// All members of a binding group, in registration order
///
/// Resolves to an empty sequence when the group has no members; group
/// consumption never fails on zero matches.
pub struct Group<K: GroupKey>(pub Vec<Arc<K::Value>>);

impl<K: GroupKey> Dep for Group<K> {
    fn resolve(cx: &mut ResolveCx<'_>) -> Result<Self> {
        Ok(Group(cx.resolve_group::<K::Value>(K::NAME)?))
    }
}

/// Marker for factories whose parameters are individual dependencies
pub struct DepArgs;

/// Marker for factories whose sole parameter is a dependency aggregate
pub struct ParamArg;

/// A registered recipe for producing a typed value
///
/// Implemented for closures `Fn(D1, .., Dn) -> Result<T>` where every `Di`
/// is a [`Dep`], and for closures `Fn(P) -> Result<T>` where `P` implements
/// [`Params`]. The marker parameter `M` only disambiguates the two families;
/// callers never name it.
pub trait Factory<M>: Send + Sync + 'static {
    /// The type this factory produces
    type Output: Send + Sync + 'static;

    /// Resolve every declared parameter depth-first, then invoke the factory
    fn build(&self, cx: &mut ResolveCx<'_>) -> Result<Self::Output>;
}

macro_rules! impl_factory {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Factory<(DepArgs, ($($arg,)*))> for Func
        where
            Func: Fn($($arg),*) -> Result<Out> + Send + Sync + 'static,
            Out: Send + Sync + 'static,
            $($arg: Dep,)*
        {
            type Output = Out;

            #[allow(non_snake_case, unused_variables)]
            fn build(&self, cx: &mut ResolveCx<'_>) -> Result<Out> {
                $(let $arg = <$arg as Dep>::resolve(cx)?;)*
                (self)($($arg),*)
            }
        }
    };
}

impl_factory!();
impl_factory!(A1);
impl_factory!(A1, A2);
impl_factory!(A1, A2, A3);
impl_factory!(A1, A2, A3, A4);
impl_factory!(A1, A2, A3, A4, A5);
impl_factory!(A1, A2, A3, A4, A5, A6);
impl_factory!(A1, A2, A3, A4, A5, A6, A7);
impl_factory!(A1, A2, A3, A4, A5, A6, A7, A8);

impl<Func, Out, P> Factory<(ParamArg, P)> for Func
where
    Func: Fn(P) -> Result<Out> + Send + Sync + 'static,
    Out: Send + Sync + 'static,
    P: Params,
{
    type Output = Out;

    fn build(&self, cx: &mut ResolveCx<'_>) -> Result<Out> {
        let params = P::hydrate(cx)?;
        (self)(params)
    }
}

/// A type-preserving post-construction interceptor
///
/// Implemented for closures `Fn(Arc<T>, D1, .., Dn) -> Result<Arc<T>>`.
/// Decorators run in registration order, after the factory produces a value
/// and before the value is cached or handed to any consumer. Extra
/// parameters resolve through the same container; the lifecycle registrar
/// uses this to reach the coordinator from an otherwise lifecycle-unaware
/// constructor.
pub trait Decorator<M>: Send + Sync + 'static {
    /// The type this decorator intercepts; input and output type are the same
    type Target: Send + Sync + 'static;

    /// Wrap or augment a freshly built instance
    fn apply(&self, instance: Arc<Self::Target>, cx: &mut ResolveCx<'_>)
        -> Result<Arc<Self::Target>>;
}

macro_rules! impl_decorator {
    ($($arg:ident),*) => {
        impl<Func, T, $($arg,)*> Decorator<(T, ($($arg,)*))> for Func
        where
            Func: Fn(Arc<T>, $($arg),*) -> Result<Arc<T>> + Send + Sync + 'static,
            T: Send + Sync + 'static,
            $($arg: Dep,)*
        {
            type Target = T;

            #[allow(non_snake_case, unused_variables)]
            fn apply(&self, instance: Arc<T>, cx: &mut ResolveCx<'_>) -> Result<Arc<T>> {
                $(let $arg = <$arg as Dep>::resolve(cx)?;)*
                (self)(instance, $($arg),*)
            }
        }
    };
}

impl_decorator!();
impl_decorator!(A1);
impl_decorator!(A1, A2);
impl_decorator!(A1, A2, A3);
impl_decorator!(A1, A2, A3, A4);
