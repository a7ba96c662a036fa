//! Class declarations as far as blocks need them.
//!
//! A class owns its methods; each method body block points back at the class
//! through a `Weak`, so dropping the class frees the whole tree.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use super::function::Function;
use crate::val::Val;

/// Method name that designates the class constructor.
pub const CONSTRUCTOR_NAME: &str = "__construct";

/// Member visibility and modifiers, stored as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFlags(i64);

impl AccessFlags {
    pub const NONE: AccessFlags = AccessFlags(0);
    pub const PUBLIC: AccessFlags = AccessFlags(1 << 0);
    pub const PROTECTED: AccessFlags = AccessFlags(1 << 1);
    pub const PRIVATE: AccessFlags = AccessFlags(1 << 2);
    pub const STATIC: AccessFlags = AccessFlags(1 << 3);
    pub const ABSTRACT: AccessFlags = AccessFlags(1 << 4);
    pub const FINAL: AccessFlags = AccessFlags(1 << 5);

    #[inline]
    pub const fn bits(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: i64) -> AccessFlags {
        AccessFlags(bits)
    }

    #[inline]
    pub const fn contains(self, other: AccessFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: AccessFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub const fn union(self, other: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | other.0)
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub access_flags: AccessFlags,
    pub func: Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub access_flags: AccessFlags,
    pub default: Val,
}

#[derive(Debug)]
pub struct UserClass {
    name: String,
    methods: IndexMap<String, Method>,
    constructor: Option<usize>,
    extends_name: Option<String>,
    interface_names: Vec<String>,
    constants: IndexMap<String, Val>,
    properties: IndexMap<String, PropertyDecl>,
}

impl UserClass {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            ..ClassBuilder::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &IndexMap<String, Method> {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// The `__construct` method, if the class declares one.
    pub fn constructor(&self) -> Option<&Method> {
        self.constructor
            .and_then(|idx| self.methods.get_index(idx))
            .map(|(_, method)| method)
    }

    pub fn extends_name(&self) -> Option<&str> {
        self.extends_name.as_deref()
    }

    pub fn interface_names(&self) -> &[String] {
        &self.interface_names
    }

    pub fn constants(&self) -> &IndexMap<String, Val> {
        &self.constants
    }

    pub fn properties(&self) -> &IndexMap<String, PropertyDecl> {
        &self.properties
    }
}

/// Collects the class-level declarations, then allocates the class together
/// with its methods so method bodies can hold a back-reference to it.
#[derive(Debug, Default, Clone)]
pub struct ClassBuilder {
    name: String,
    extends_name: Option<String>,
    interface_names: Vec<String>,
    constants: IndexMap<String, Val>,
    properties: IndexMap<String, PropertyDecl>,
}

impl ClassBuilder {
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends_name = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interface_names.push(interface.into());
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: Val) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn property(mut self, name: impl Into<String>, access_flags: AccessFlags, default: Val) -> Self {
        self.properties.insert(name.into(), PropertyDecl { access_flags, default });
        self
    }

    /// Allocate the class. `methods` receives the not-yet-upgradable handle of
    /// the class being built and returns its methods in declaration order;
    /// method bodies should store that handle as their `method_of_class`.
    ///
    /// If `methods` fails, nothing is allocated that outlives this call.
    pub fn build<E, F>(self, methods: F) -> Result<Arc<UserClass>, E>
    where
        F: FnOnce(&Weak<UserClass>) -> Result<Vec<(String, Method)>, E>,
    {
        let mut failure = None;
        let class = Arc::new_cyclic(|this| {
            let methods = match methods(this) {
                Ok(methods) => methods,
                Err(err) => {
                    failure = Some(err);
                    Vec::new()
                }
            };
            self.assemble(methods)
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(class),
        }
    }

    fn assemble(self, list: Vec<(String, Method)>) -> UserClass {
        let mut methods = IndexMap::with_capacity(list.len());
        for (name, method) in list {
            methods.insert(name, method);
        }
        let constructor = methods.get_index_of(CONSTRUCTOR_NAME);
        UserClass {
            name: self.name,
            methods,
            constructor,
            extends_name: self.extends_name,
            interface_names: self.interface_names,
            constants: self.constants,
            properties: self.properties,
        }
    }
}
