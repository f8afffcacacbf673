use std::collections::HashSet;

/// Seen-set of `kind|file|line|identifier` keys.
#[derive(Debug, Default, Clone)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Deduplicator::default()
    }

    /// True only the first time the key is seen.
    pub fn report(&mut self, kind: &str, file: &str, line: u32, identifier: &str) -> bool {
        let key = format!("{}|{}|{}|{}", kind, file, line, identifier);
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
