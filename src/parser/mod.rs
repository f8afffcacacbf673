//! Parser module for building the syntax tree.
//!
//! This module contains the parser that transforms a stream of tokens
//! into a syntax tree. It uses a Pratt parser for expressions with proper
//! operator precedence and handles:
//!
//! - Statement parsing (assignments, functions, classes, control flow, imports)
//! - Expression parsing (operators, calls, displays, comprehensions, lambdas)
//! - Indented blocks and `;`-separated simple statements
//! - Error reporting with source positions
//!
//! The parser uses NUD (null denotation) and LED (left denotation) functions
//! for expression parsing with binding power for precedence handling.

pub mod expr;
pub mod lookups;
pub mod parser;
pub mod stmt;

#[cfg(test)]
mod tests;
