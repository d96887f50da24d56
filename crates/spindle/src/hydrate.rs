//! Parameter-object hydration
//!
//! Some constructors want one aggregate argument grouping many named
//! dependencies instead of a long positional parameter list. The [`params!`]
//! macro declares such an aggregate and derives [`Params`], the compile-time
//! equivalent of rewriting the constructor into a multi-argument factory:
//! every `pub` field hydrates from the container in declaration order, while
//! non-`pub` fields are skipped and filled with `Default::default()`. An
//! aggregate with no resolvable fields hydrates from nothing.
//!
//! Ordinary factories never pass through this path at all; the adapter is
//! transparent for them (see [`Factory`](crate::Factory)).
//!
//! ```ignore
//! spindle::params! {
//!     pub struct ServerDeps {
//!         pub clock: Arc<Clock>,
//!         pub metrics: Option<Arc<Metrics>>,
//!     }
//! }
//!
//! let module = Module::new("web")
//!     .public(|deps: ServerDeps| Ok(Server::new(deps.clock, deps.metrics)));
//! ```

use crate::container::ResolveCx;
use crate::error::Result;

/// A dependency aggregate: a named-field struct whose fields resolve through
/// the container in declaration order
pub trait Params: Sized + Send + 'static {
    /// Resolve every eligible field and assemble the aggregate
    fn hydrate(cx: &mut ResolveCx<'_>) -> Result<Self>;
}

/// Declare a dependency-aggregate struct and derive [`Params`] for it
///
/// `pub` fields must implement [`Dep`](crate::Dep) and are resolved in
/// declaration order; non-`pub` fields must implement `Default` and are left
/// at their default value.
#[macro_export]
macro_rules! params {
    (
        $(#[$meta:meta])*
        $svis:vis struct $name:ident { $($fields:tt)* }
    ) => {
        $crate::__params_fields!([$(#[$meta])*] [$svis] $name [cx] [] [] $($fields)*);
    };
}

// The `cx` binder is minted once in `params!` and threaded through every
// recursion step; the accumulated resolve expressions and the `hydrate`
// parameter reuse that one captured token, so they share a hygiene context.
#[doc(hidden)]
#[macro_export]
macro_rules! __params_fields {
    // All fields consumed: emit the struct and its Params impl.
    ([$(#[$meta:meta])*] [$svis:vis] $name:ident [$cx:ident] [$($def:tt)*] [$($hyd:tt)*]) => {
        $(#[$meta])*
        $svis struct $name {
            $($def)*
        }

        impl $crate::Params for $name {
            #[allow(unused_variables)]
            fn hydrate(
                $cx: &mut $crate::ResolveCx<'_>,
            ) -> $crate::Result<Self> {
                Ok(Self { $($hyd)* })
            }
        }
    };
    // A `pub` field: resolved through the container.
    ([$(#[$meta:meta])*] [$svis:vis] $name:ident [$cx:ident] [$($def:tt)*] [$($hyd:tt)*]
        pub $field:ident : $ty:ty $(, $($rest:tt)*)?
    ) => {
        $crate::__params_fields!([$(#[$meta])*] [$svis] $name [$cx]
            [$($def)* pub $field: $ty,]
            [$($hyd)* $field: <$ty as $crate::Dep>::resolve($cx)?,]
            $($($rest)*)?);
    };
    // A non-`pub` field: skipped, left at its default value.
    ([$(#[$meta:meta])*] [$svis:vis] $name:ident [$cx:ident] [$($def:tt)*] [$($hyd:tt)*]
        $field:ident : $ty:ty $(, $($rest:tt)*)?
    ) => {
        $crate::__params_fields!([$(#[$meta])*] [$svis] $name [$cx]
            [$($def)* $field: $ty,]
            [$($hyd)* $field: ::core::default::Default::default(),]
            $($($rest)*)?);
    };
}
