//! The type algebra.
//!
//! This module holds the closed set of type values the checker assigns to
//! expressions and the rules that operate on them:
//!
//! - types: type values, containers and probabilistic unions
//! - arena: storage for classes, instances, functions and modules
//! - attributes: attribute reads, writes and deletions
//! - subtype: the compatibility relation
//! - binop: binary and unary operator results

pub mod arena;
pub mod attributes;
pub mod binop;
pub mod subtype;
pub mod types;

#[cfg(test)]
mod tests;
