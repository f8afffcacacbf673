//! Lexical analysis module for the checker front end.
//!
//! This module contains the lexer (tokenizer) that converts source code
//! into a stream of tokens for parsing. It handles:
//!
//! - Tokenization of source code using regex patterns
//! - Recognition of keywords, identifiers, literals, and operators
//! - Indentation tracking (`Newline`, `Indent` and `Dedent` tokens)
//! - Token position tracking (offset, line, column) for diagnostics
//! - Comments, blank lines and line continuations

pub mod lexer;
pub mod tokens;
