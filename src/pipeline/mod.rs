//! The pipeline stage library.
//!
//! Each stage is a pure transformation from a sequence of rows to a new
//! sequence of rows; no stage mutates its input. Stages are configured
//! declaratively (field names, operators, constants) so a stage list can be
//! validated against the dataset schema before any data is touched.
//!
//! - `row`: the dynamic row/value model rows flow through
//! - `stage`: the stage definitions, validation, and execution

pub mod row;
pub mod stage;

pub use row::*;
pub use stage::*;
