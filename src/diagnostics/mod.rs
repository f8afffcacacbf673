//! Diagnostics reported against the checked program.
//!
//! Diagnostics are semantic findings, never internal faults. Each report
//! passes the ignored-path filter, the scoped suppression stack and the
//! deduplicator before it is logged and queued for the caller's sink.

pub mod dedup;
pub mod diagnostics;
