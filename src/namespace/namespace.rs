use std::collections::HashMap;

use indexmap::IndexMap;

use crate::types::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Type,
    pub confidence: f64,
    /// Bound by an `isinstance` narrowing rather than an assignment.
    pub narrowed: bool,
}

impl Binding {
    pub fn new(ty: Type, confidence: f64) -> Self {
        Binding {
            ty,
            confidence,
            narrowed: false,
        }
    }
}

/// One lexical scope.
#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: String,
    pub bindings: IndexMap<String, Binding>,
    pub parent: Option<NamespaceId>,
    /// Names declared `global` or `nonlocal`, bound in another scope.
    pub redirects: HashMap<String, NamespaceId>,
}

impl Namespace {
    pub fn new(name: &str, parent: Option<NamespaceId>) -> Self {
        Namespace {
            name: name.to_string(),
            bindings: IndexMap::new(),
            parent,
            redirects: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
