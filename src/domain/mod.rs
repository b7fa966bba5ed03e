//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the source dataset schema (`Record`) and its enumerations (`Genre`, `Region`)
//! - run configuration (`RunConfig`)
//! - the typed result rows each query produces (the result contract)

pub mod types;

pub use types::*;
