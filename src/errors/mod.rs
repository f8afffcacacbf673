//! Error types and error handling for the checker.
//!
//! This module defines the internal faults raised while reading and
//! checking a program. Semantic inconsistencies in the checked program are
//! not errors; they are reported as diagnostics. It includes:
//!
//! - Error structures with source position information
//! - Variants for lexing, parsing and unsupported constructs
//! - Error formatting and display functionality
//! - Helpful error messages and suggestions

pub mod errors;

#[cfg(test)]
mod tests;
