//! Resolver / container
//!
//! Lazily builds and memoizes singleton instances by walking factory
//! dependencies depth-first. Guarantees:
//!
//! - singleton semantics: exactly one instance per binding for the
//!   container's lifetime, returned by `Arc` identity on every later request;
//! - at-most-once construction under concurrency: first resolutions of the
//!   same binding serialize on a per-binding slot lock;
//! - in-flight cycle detection: a binding transitively requiring itself fails
//!   with the full type chain instead of recursing forever.
//!
//! Resolution carries the consuming module's scope so private bindings stay
//! invisible outside their declaring module.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::key::BindingKey;
use crate::observer::{ContainerEvent, Observer};
use crate::registry::{AnyArc, BindingTable, FactoryEntry, InvokerEntry};

/// The resolver: builds, decorates, and caches the object graph on demand
pub struct Container {
    table: BindingTable,
    /// Per-binding memoization slot; the slot mutex serializes concurrent
    /// first-time construction so a factory runs at most once
    slots: DashMap<usize, Arc<Mutex<Option<AnyArc>>>>,
    observer: Arc<dyn Observer>,
}

impl Container {
    pub(crate) fn new(table: BindingTable, observer: Arc<dyn Observer>) -> Self {
        Self {
            table,
            slots: DashMap::new(),
            observer,
        }
    }

    /// Resolve the default binding of `T`
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.root_cx().resolve::<T>()
    }

    /// Resolve the binding of `T` registered under the given name
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.root_cx().resolve_named::<T>(name)
    }

    /// Resolve the default binding of `T`, or `None` when it has no binding
    pub fn resolve_optional<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        self.root_cx().resolve_optional::<T>()
    }

    /// Resolve every member of a group, in registration order
    ///
    /// An unknown group name yields an empty vector, never an error.
    pub fn resolve_group<T: Send + Sync + 'static>(&self, group: &str) -> Result<Vec<Arc<T>>> {
        self.root_cx().resolve_group::<T>(group)
    }

    pub(crate) fn run_invoker(&self, invoker: &InvokerEntry) -> Result<()> {
        let mut cx = ResolveCx {
            container: self,
            scope: Some(invoker.module.clone()),
            stack: Vec::new(),
        };
        (invoker.run)(&mut cx)
    }

    fn root_cx(&self) -> ResolveCx<'_> {
        ResolveCx {
            container: self,
            scope: None,
            stack: Vec::new(),
        }
    }

    /// Build (or fetch from cache) the instance for one binding entry
    fn resolve_entry(&self, entry: &FactoryEntry, cx: &mut ResolveCx<'_>) -> Result<AnyArc> {
        if cx.stack.iter().any(|(id, _)| *id == entry.id) {
            let mut chain: Vec<String> =
                cx.stack.iter().map(|(_, key)| key.to_string()).collect();
            chain.push(entry.key.to_string());
            return Err(Error::CyclicDependency {
                chain: chain.join(" -> "),
            });
        }

        let slot = self.slots.entry(entry.id).or_default().clone();
        let mut guard = slot.lock();
        if let Some(cached) = guard.as_ref() {
            return Ok(Arc::clone(cached));
        }

        cx.stack.push((entry.id, entry.key.clone()));
        let previous_scope = std::mem::replace(&mut cx.scope, Some(entry.module.clone()));
        let built = (entry.build)(cx).and_then(|value| self.apply_decorators(entry, value, cx));
        cx.scope = previous_scope;
        cx.stack.pop();

        let value = built?;
        *guard = Some(Arc::clone(&value));
        self.observer.event(&ContainerEvent::Resolved {
            key: entry.key.to_string(),
            module: entry.module.clone(),
        });
        Ok(value)
    }

    fn apply_decorators(
        &self,
        entry: &FactoryEntry,
        value: AnyArc,
        cx: &mut ResolveCx<'_>,
    ) -> Result<AnyArc> {
        let mut value = value;
        for decorator in self.table.decorators_for(entry.key.type_id()) {
            let previous_scope =
                std::mem::replace(&mut cx.scope, Some(decorator.module.clone()));
            let decorated = (decorator.apply)(value, cx);
            cx.scope = previous_scope;
            value = decorated?;
            self.observer.event(&ContainerEvent::Decorated {
                type_name: decorator.type_name,
            });
        }
        Ok(value)
    }
}

/// One in-flight resolution: the container plus the consuming module's scope
/// and the in-progress binding stack used for cycle detection
pub struct ResolveCx<'a> {
    container: &'a Container,
    scope: Option<String>,
    stack: Vec<(usize, BindingKey)>,
}

impl ResolveCx<'_> {
    /// Resolve the default binding of `T`; fails when no binding exists
    pub fn resolve<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        self.resolve_key(BindingKey::of::<T>())
    }

    /// Resolve the named binding of `T`; fails when no binding exists
    pub fn resolve_named<T: Send + Sync + 'static>(&mut self, name: &str) -> Result<Arc<T>> {
        self.resolve_key(BindingKey::named::<T>(name))
    }

    /// Resolve the default binding of `T`, or `None` when it has no binding
    pub fn resolve_optional<T: Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>> {
        let key = BindingKey::of::<T>();
        if self
            .container
            .table
            .lookup(&key, self.scope.as_deref())
            .is_none()
        {
            return Ok(None);
        }
        self.resolve_key(key).map(Some)
    }

    /// Resolve every member of the group of `T` under the given name
    pub fn resolve_group<T: Send + Sync + 'static>(&mut self, group: &str) -> Result<Vec<Arc<T>>> {
        let container = self.container;
        let key = BindingKey::grouped::<T>(group);
        let ids: Vec<usize> = container.table.group(&key).to_vec();
        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = container.table.entry(id);
            let value = container.resolve_entry(entry, self)?;
            members.push(downcast::<T>(value, entry.key.type_name())?);
        }
        Ok(members)
    }

    fn resolve_key<T: Send + Sync + 'static>(&mut self, key: BindingKey) -> Result<Arc<T>> {
        let container = self.container;
        let scope = self.scope.clone();
        let entry = match container.table.lookup(&key, scope.as_deref()) {
            Some(entry) => entry,
            None => {
                return Err(Error::UnresolvedDependency {
                    dependency: key.to_string(),
                    chain: self.chain_display(),
                });
            }
        };
        let value = container.resolve_entry(entry, self)?;
        downcast::<T>(value, key.type_name())
    }

    fn chain_display(&self) -> String {
        if self.stack.is_empty() {
            "the root resolution request".to_string()
        } else {
            self.stack
                .iter()
                .map(|(_, key)| key.to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        }
    }
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc, type_name: &'static str) -> Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| Error::lifecycle(format!("internal: cached instance type mismatch for `{type_name}`")))
}
