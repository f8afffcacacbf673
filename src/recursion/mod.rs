//! Recursion guard consulted by the evaluator before entering a function
//! body.

pub mod recursion;

#[cfg(test)]
mod tests;
