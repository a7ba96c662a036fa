use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::klass::UserClass;
use crate::val::Val;

/// Hooks the block reader calls back into while rebuilding a block tree.
pub trait Runtime {
    /// Turn a deserialized integer constant into a runtime value.
    fn wrap_int(&mut self, value: i64) -> Val {
        Val::Int(value)
    }

    /// Called once per class, after all of its methods are attached.
    fn declare_class(&mut self, class: Arc<UserClass>);
}

/// In-memory class registry. Lookups ignore ASCII case, as class names do in
/// the source language; iteration follows declaration order.
#[derive(Debug, Default, Clone)]
pub struct ClassTable {
    classes: IndexMap<String, Arc<UserClass>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<UserClass>> {
        self.classes.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<UserClass>> {
        self.classes.values()
    }
}

impl Runtime for ClassTable {
    fn declare_class(&mut self, class: Arc<UserClass>) {
        let key = class.name().to_ascii_lowercase();
        debug!(class = class.name(), methods = class.methods().len(), "declare class");
        // Redeclaration replaces the entry but keeps its original position.
        self.classes.insert(key, class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_class(name: &str) -> Arc<UserClass> {
        UserClass::builder(name).build(|_| Ok::<_, ()>(Vec::new())).unwrap()
    }

    #[test]
    fn lookup_ignores_case() {
        let mut table = ClassTable::new();
        table.declare_class(empty_class("FooBar"));
        assert!(table.contains("foobar"));
        assert!(table.contains("FOOBAR"));
        assert_eq!(table.get("fooBar").map(|c| c.name()), Some("FooBar"));
        assert!(table.get("Foo").is_none());
    }

    #[test]
    fn keeps_declaration_order() {
        let mut table = ClassTable::new();
        for name in ["B", "A", "C"] {
            table.declare_class(empty_class(name));
        }
        table.declare_class(empty_class("a"));
        let names: Vec<_> = table.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["B", "a", "C"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn default_int_wrapping() {
        let mut table = ClassTable::new();
        assert_eq!(table.wrap_int(-7), Val::Int(-7));
        assert!(table.is_empty());
    }
}
