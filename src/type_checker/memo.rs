use std::{collections::HashMap, rc::Rc};

use crate::{ast::ast::NodeId, namespace::namespace::NamespaceId, types::types::Type};

/// State an evaluation result depends on. A memoised result is reused only
/// while all of it is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub namespace: NamespaceId,
    pub namespace_generation: u64,
    pub type_generation: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    ty: Type,
    stamp: Stamp,
}

/// Per-node results of a run, keyed by file and node id.
#[derive(Debug, Default)]
pub struct NodeMemo {
    entries: HashMap<(Rc<String>, NodeId), Entry>,
    hits: usize,
}

impl NodeMemo {
    pub fn new() -> Self {
        NodeMemo::default()
    }

    pub fn get(&mut self, file: &Rc<String>, node: NodeId, stamp: Stamp) -> Option<Type> {
        let entry = self.entries.get(&(Rc::clone(file), node))?;
        if entry.stamp != stamp {
            return None;
        }
        self.hits += 1;
        Some(entry.ty.clone())
    }

    pub fn store(&mut self, file: &Rc<String>, node: NodeId, ty: Type, stamp: Stamp) {
        self.entries.insert((Rc::clone(file), node), Entry { ty, stamp });
    }

    pub fn invalidate(&mut self, file: &Rc<String>, node: NodeId) {
        self.entries.remove(&(Rc::clone(file), node));
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
