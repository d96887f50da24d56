//! Binding keys
//!
//! A binding is addressed by the type it produces plus an optional tag. Named
//! tags distinguish multiple singletons of one type; group tags collect many
//! independent bindings under one retrievable sequence.

use std::any::TypeId;
use std::fmt;

/// Optional qualifier on a binding key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// The default, untagged binding for a type
    None,
    /// A uniquely named binding
    Name(String),
    /// A member of an ordered, many-valued group
    Group(String),
}

/// Identity of a binding: produced type plus tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    type_id: TypeId,
    type_name: &'static str,
    tag: Tag,
}

impl BindingKey {
    /// Key for the default binding of `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            tag: Tag::None,
        }
    }

    /// Key for the binding of `T` under the given name
    pub fn named<T: 'static>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            tag: Tag::Name(name.into()),
        }
    }

    /// Key for the group of `T` bindings under the given group name
    pub fn grouped<T: 'static>(group: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            tag: Tag::Group(group.into()),
        }
    }

    /// The produced type's `TypeId`
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The produced type's name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The binding's tag
    pub fn tag(&self) -> &Tag {
        &self.tag
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Tag::None => write!(f, "`{}`", self.type_name),
            Tag::Name(name) => write!(f, "`{}`[name={}]", self.type_name, name),
            Tag::Group(group) => write!(f, "`{}`[group={}]", self.type_name, group),
        }
    }
}
