//! `vg-sales` library crate.
//!
//! The binary (`vgs`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the query layer is reusable by other front-ends (e.g., a chart renderer)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod queries;
pub mod report;
