//! Builtin names of the checked language.
//!
//! Fixed signature tables for builtin functions, exception names and
//! primitive attributes, plus the argument-aware refinements used when a
//! builtin's result depends on what it is called with.

pub mod functions;

#[cfg(test)]
mod tests;
