//! Binding table
//!
//! Flattened storage for every binding, decorator, and invoker a module tree
//! declares. The table is frozen once the app host finishes composition, so
//! decoration can never re-register bindings mid-resolution.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::container::ResolveCx;
use crate::error::{Error, Result};
use crate::key::{BindingKey, Tag};

/// A memoized, type-erased singleton instance
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Erased factory invocation
pub(crate) type BuildFn = Box<dyn Fn(&mut ResolveCx<'_>) -> Result<AnyArc> + Send + Sync>;

/// Erased decorator invocation
pub(crate) type DecorateFn = Box<dyn Fn(AnyArc, &mut ResolveCx<'_>) -> Result<AnyArc> + Send + Sync>;

/// Erased invoker body
pub(crate) type InvokeFn = Box<dyn Fn(&mut ResolveCx<'_>) -> Result<()> + Send + Sync>;

/// Whether a binding is visible to the whole graph or only to its module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Public,
    Private,
}

pub(crate) struct FactoryEntry {
    pub id: usize,
    pub key: BindingKey,
    /// Dotted path of the declaring module, e.g. `root.web`
    pub module: String,
    pub build: BuildFn,
}

pub(crate) struct DecoratorEntry {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub module: String,
    pub apply: DecorateFn,
}

pub(crate) struct InvokerEntry {
    pub module: String,
    pub run: InvokeFn,
}

/// Flattened binding storage with strict public-uniqueness checking
#[derive(Default)]
pub(crate) struct BindingTable {
    entries: Vec<FactoryEntry>,
    /// Public bindings with a `None` or `Name` tag
    by_key: HashMap<BindingKey, usize>,
    /// Private bindings, scoped by declaring module path
    privates: HashMap<(String, BindingKey), usize>,
    /// Group-tagged bindings, in registration order
    groups: HashMap<BindingKey, Vec<usize>>,
    /// Decorators per intercepted type, in registration order
    decorators: HashMap<TypeId, Vec<DecoratorEntry>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding, enforcing the flattened-uniqueness invariant
    ///
    /// At most one public binding may exist per `(type, tag)` pair across the
    /// whole merged graph. Private bindings are checked only against their
    /// own module and may shadow a public binding without conflict. Group
    /// members never conflict; they accumulate in registration order.
    pub fn register(
        &mut self,
        key: BindingKey,
        visibility: Visibility,
        module: &str,
        build: BuildFn,
    ) -> Result<()> {
        let id = self.entries.len();

        if let Tag::Group(_) = key.tag() {
            self.groups.entry(key.clone()).or_default().push(id);
        } else {
            match visibility {
                Visibility::Public => {
                    if let Some(&existing) = self.by_key.get(&key) {
                        return Err(Error::DuplicateBinding {
                            key: key.to_string(),
                            existing: self.entries[existing].module.clone(),
                            duplicate: module.to_string(),
                        });
                    }
                    self.by_key.insert(key.clone(), id);
                }
                Visibility::Private => {
                    let scoped = (module.to_string(), key.clone());
                    if self.privates.contains_key(&scoped) {
                        return Err(Error::DuplicateBinding {
                            key: key.to_string(),
                            existing: module.to_string(),
                            duplicate: module.to_string(),
                        });
                    }
                    self.privates.insert(scoped, id);
                }
            }
        }

        self.entries.push(FactoryEntry {
            id,
            key,
            module: module.to_string(),
            build,
        });
        Ok(())
    }

    pub fn add_decorator(&mut self, entry: DecoratorEntry) {
        self.decorators.entry(entry.type_id).or_default().push(entry);
    }

    /// Look up the binding for `key` as seen from the given module scope
    ///
    /// A private binding of the consuming module wins over a public binding
    /// of the same key; private bindings of other modules are invisible.
    pub fn lookup(&self, key: &BindingKey, scope: Option<&str>) -> Option<&FactoryEntry> {
        if let Some(scope) = scope {
            if let Some(&id) = self.privates.get(&(scope.to_string(), key.clone())) {
                return Some(&self.entries[id]);
            }
        }
        self.by_key.get(key).map(|&id| &self.entries[id])
    }

    /// Every member of a group, in registration order; empty when unknown
    pub fn group(&self, key: &BindingKey) -> &[usize] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entry(&self, id: usize) -> &FactoryEntry {
        &self.entries[id]
    }

    pub fn decorators_for(&self, type_id: TypeId) -> &[DecoratorEntry] {
        self.decorators
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    fn noop_build() -> BuildFn {
        Box::new(|_| Ok(Arc::new(Clock) as AnyArc))
    }

    #[test]
    fn second_public_binding_conflicts() {
        let mut table = BindingTable::new();
        table
            .register(BindingKey::of::<Clock>(), Visibility::Public, "core", noop_build())
            .unwrap();
        let err = table
            .register(BindingKey::of::<Clock>(), Visibility::Public, "web", noop_build())
            .unwrap_err();
        match err {
            Error::DuplicateBinding { existing, duplicate, .. } => {
                assert_eq!(existing, "core");
                assert_eq!(duplicate, "web");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn private_shadows_public_for_its_module_only() {
        let mut table = BindingTable::new();
        table
            .register(BindingKey::of::<Clock>(), Visibility::Public, "core", noop_build())
            .unwrap();
        table
            .register(BindingKey::of::<Clock>(), Visibility::Private, "web", noop_build())
            .unwrap();

        let seen_from_web = table.lookup(&BindingKey::of::<Clock>(), Some("web")).unwrap();
        assert_eq!(seen_from_web.module, "web");

        let seen_from_cli = table.lookup(&BindingKey::of::<Clock>(), Some("cli")).unwrap();
        assert_eq!(seen_from_cli.module, "core");

        let seen_from_root = table.lookup(&BindingKey::of::<Clock>(), None).unwrap();
        assert_eq!(seen_from_root.module, "core");
    }

    #[test]
    fn groups_accumulate_without_conflict() {
        let mut table = BindingTable::new();
        let key = BindingKey::grouped::<Clock>("clocks");
        table
            .register(key.clone(), Visibility::Public, "a", noop_build())
            .unwrap();
        table
            .register(key.clone(), Visibility::Public, "b", noop_build())
            .unwrap();
        assert_eq!(table.group(&key).len(), 2);
        assert!(table.group(&BindingKey::grouped::<Clock>("other")).is_empty());
    }
}
