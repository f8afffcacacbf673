//! Scopes and name resolution.
//!
//! - namespace: a single scope and its bindings
//! - type_map: the namespace arena with the current-scope cursor, the
//!   save/restore stack and the binding rules

pub mod namespace;
pub mod type_map;

#[cfg(test)]
mod tests;
