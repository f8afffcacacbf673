use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Available,
    Busy,
}

/// Name-keyed busy flags bounding recursive body evaluation.
///
/// A key never seen counts as available. A body being evaluated is busy
/// until its evaluation ends, and a call arriving for a busy key must not
/// re-enter the body.
#[derive(Debug, Default, Clone)]
pub struct RecursionGuard {
    flags: HashMap<String, GuardState>,
    depth: usize,
}

impl RecursionGuard {
    pub fn new() -> Self {
        RecursionGuard::default()
    }

    pub fn state(&self, key: &str) -> GuardState {
        self.flags
            .get(key)
            .copied()
            .unwrap_or(GuardState::Available)
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.state(key) == GuardState::Busy
    }

    /// Marks `key` busy. Returns false, changing nothing, when it already is.
    pub fn try_enter(&mut self, key: &str) -> bool {
        if self.is_busy(key) {
            log::trace!("recursive entry into {} short-circuited", key);
            return false;
        }
        self.flags.insert(key.to_string(), GuardState::Busy);
        self.depth += 1;
        true
    }

    pub fn exit(&mut self, key: &str) {
        if let Some(state) = self.flags.get_mut(key) {
            if *state == GuardState::Busy {
                *state = GuardState::Available;
                self.depth -= 1;
            }
        }
    }

    /// Number of bodies currently under evaluation.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn reset(&mut self) {
        self.flags.clear();
        self.depth = 0;
    }
}
