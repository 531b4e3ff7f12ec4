//! Pipeline services
//!
//! Each stage is an independently testable unit; the pipeline module wires
//! them together per archive item.

pub mod archive_select;
pub mod edit_cuts;
pub mod extraction;
pub mod pattern;
pub mod reconcile;
pub mod records;
pub mod state_store;
pub mod tracker;
pub mod transformation;
pub mod validation;
