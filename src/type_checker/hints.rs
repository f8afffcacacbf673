use std::collections::HashMap;

use crate::{types::types::Type, Span};

/// Source range a hint is attached to: line, first column, end column.
pub type HintKey = (u32, u32, u32);

/// Externally inferred types for source ranges of the checked file.
///
/// Parsing the hint format is left to the producer; entries arrive as
/// converted types with a probability.
#[derive(Debug, Clone, Default)]
pub struct TypeHints {
    hints: HashMap<HintKey, (Type, f64)>,
}

impl TypeHints {
    pub fn new() -> Self {
        TypeHints::default()
    }

    pub fn insert(&mut self, line: u32, start: u32, end: u32, ty: Type, probability: f64) {
        self.hints.insert((line, start, end), (ty, probability));
    }

    pub fn get(&self, span: &Span) -> Option<&(Type, f64)> {
        self.hints
            .get(&(span.start.line, span.start.column, span.end.column))
    }

    pub fn len(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}
