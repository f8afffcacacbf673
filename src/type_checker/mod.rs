//! Tree evaluator.
//!
//! Walks a parsed module statement by statement, inferring a type for
//! every expression and binding names in the scope manager. Semantic
//! inconsistencies are reported as diagnostics through the session hub;
//! only internal faults travel as `Err` and are skipped at statement
//! boundaries.
//!
//! Entry points are [`type_checker::check`] and
//! [`type_checker::check_with`], which return the module's
//! [`type_checker::SymbolTable`].

pub mod annotations;
pub mod assign;
pub mod call;
pub mod config;
pub mod definitions;
pub mod expr;
pub mod hints;
pub mod memo;
pub mod modules;
pub mod returns;
pub mod stmt;
pub mod type_checker;
