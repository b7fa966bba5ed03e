//! Reporting utilities: formatted terminal output for query results.
//!
//! We keep formatting code in one place so:
//! - the query/pipeline code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

pub mod format;

pub use format::*;
