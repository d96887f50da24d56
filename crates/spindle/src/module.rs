//! Modules
//!
//! A module is a named, composable bundle of bindings, decorators, invokers,
//! and lifecycle declarations. Modules compose by tree concatenation: a
//! parent's public bindings are visible to the whole graph, while private
//! bindings stay inside their declaring module and may shadow a public
//! binding of the same key. Once handed to the app host a module is
//! flattened, in declaration order, parent before children.

use std::any::TypeId;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::key::BindingKey;
use crate::provider::{Decorator, Factory};
use crate::registry::{
    AnyArc, BindingTable, DecorateFn, DecoratorEntry, InvokeFn, InvokerEntry, Visibility,
};
use crate::service::{Capability, ServiceDecl};

enum Decl {
    Binding {
        key: BindingKey,
        visibility: Visibility,
        build: crate::registry::BuildFn,
    },
    Decorator {
        type_id: TypeId,
        type_name: &'static str,
        apply: DecorateFn,
    },
    Invoker {
        run: InvokeFn,
    },
    Service(ServiceDecl),
}

/// A named, composable bundle of bindings and lifecycle declarations
pub struct Module {
    name: &'static str,
    decls: Vec<Decl>,
    submodules: Vec<Module>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            decls: Vec::new(),
            submodules: Vec::new(),
        }
    }

    /// The module's name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a public factory for its output type
    pub fn public<F, M>(mut self, factory: F) -> Self
    where
        F: Factory<M>,
    {
        self.push_factory(BindingKey::of::<F::Output>(), Visibility::Public, factory);
        self
    }

    /// Register a public factory under a unique name tag
    pub fn public_named<F, M>(mut self, name: &str, factory: F) -> Self
    where
        F: Factory<M>,
    {
        self.push_factory(
            BindingKey::named::<F::Output>(name),
            Visibility::Public,
            factory,
        );
        self
    }

    /// Register a factory as one member of an ordered group
    pub fn public_grouped<F, M>(mut self, group: &str, factory: F) -> Self
    where
        F: Factory<M>,
    {
        self.push_factory(
            BindingKey::grouped::<F::Output>(group),
            Visibility::Public,
            factory,
        );
        self
    }

    /// Register a factory visible only inside this module
    pub fn private<F, M>(mut self, factory: F) -> Self
    where
        F: Factory<M>,
    {
        self.push_factory(BindingKey::of::<F::Output>(), Visibility::Private, factory);
        self
    }

    /// Register an already-constructed instance as a public binding
    pub fn supply<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        let shared: AnyArc = Arc::new(value);
        self.decls.push(Decl::Binding {
            key: BindingKey::of::<T>(),
            visibility: Visibility::Public,
            build: Box::new(move |_| Ok(Arc::clone(&shared))),
        });
        self
    }

    /// Register a type-preserving post-construction decorator
    pub fn decorate<D, M>(mut self, decorator: D) -> Self
    where
        D: Decorator<M>,
    {
        let type_name = std::any::type_name::<D::Target>();
        let apply: DecorateFn = Box::new(move |instance, cx| {
            let typed = instance.downcast::<D::Target>().map_err(|_| {
                Error::lifecycle(format!(
                    "internal: decorator type mismatch for `{type_name}`"
                ))
            })?;
            decorator.apply(typed, cx).map(|value| value as AnyArc)
        });
        self.decls.push(Decl::Decorator {
            type_id: TypeId::of::<D::Target>(),
            type_name,
            apply,
        });
        self
    }

    /// Register an invoker: a function run eagerly when the app host builds
    /// the graph, with its parameters resolved like any factory's
    pub fn invoke<F, M>(mut self, invoker: F) -> Self
    where
        F: Factory<M, Output = ()>,
    {
        self.decls.push(Decl::Invoker {
            run: Box::new(move |cx| invoker.build(cx)),
        });
        self
    }

    /// Declare a type as a lifecycle participant
    ///
    /// Use [`service!`](crate::service!) to produce the declaration. A
    /// declaration whose type satisfies neither lifecycle contract fails
    /// composition with [`Error::CapabilityMismatch`].
    pub fn service(mut self, decl: ServiceDecl) -> Self {
        self.decls.push(Decl::Service(decl));
        self
    }

    /// Attach a submodule; its public bindings join the shared graph, its
    /// private bindings never leak to siblings or parent
    pub fn submodule(mut self, module: Module) -> Self {
        self.submodules.push(module);
        self
    }

    fn push_factory<F, M>(&mut self, key: BindingKey, visibility: Visibility, factory: F)
    where
        F: Factory<M>,
    {
        self.decls.push(Decl::Binding {
            key,
            visibility,
            build: Box::new(move |cx| factory.build(cx).map(|value| Arc::new(value) as AnyArc)),
        });
    }

    /// Merge this module tree into the flattened graph, depth-first, parent
    /// declarations before children
    pub(crate) fn flatten_into(
        self,
        prefix: &str,
        table: &mut BindingTable,
        invokers: &mut Vec<InvokerEntry>,
    ) -> Result<()> {
        let path = if prefix.is_empty() {
            self.name.to_string()
        } else {
            format!("{prefix}.{}", self.name)
        };

        for decl in self.decls {
            match decl {
                Decl::Binding {
                    key,
                    visibility,
                    build,
                } => {
                    table.register(key, visibility, &path, build)?;
                }
                Decl::Decorator {
                    type_id,
                    type_name,
                    apply,
                } => {
                    table.add_decorator(DecoratorEntry {
                        type_id,
                        type_name,
                        module: path.clone(),
                        apply,
                    });
                }
                Decl::Invoker { run } => {
                    invokers.push(InvokerEntry {
                        module: path.clone(),
                        run,
                    });
                }
                Decl::Service(decl) => {
                    if decl.capability == Capability::None {
                        return Err(Error::CapabilityMismatch {
                            type_name: decl.type_name,
                        });
                    }
                    tracing::debug!(
                        service = decl.type_name,
                        capability = %decl.capability,
                        module = %path,
                        "lifecycle service classified"
                    );
                    if let Some((type_id, apply)) = decl.hook {
                        table.add_decorator(DecoratorEntry {
                            type_id,
                            type_name: decl.type_name,
                            module: path.clone(),
                            apply,
                        });
                    }
                    if let Some(run) = decl.invoke {
                        invokers.push(InvokerEntry {
                            module: path.clone(),
                            run,
                        });
                    }
                }
            }
        }

        for submodule in self.submodules {
            submodule.flatten_into(&path, table, invokers)?;
        }
        Ok(())
    }
}
