//! # Remig Batch - Archive Migration Engine
//!
//! Batch pipeline that reconstructs a versioned, deduplicated graph of
//! case/booking/session/recording entities from a legacy recording archive
//! inventory:
//! - Filename pattern matching and metadata extraction
//! - Cleansing and validation against reference data
//! - Idempotent migration-record tracking (SQLite)
//! - Entity reconciliation with ORIGINAL/COPY version linkage
//! - Edit cut-instruction translation for downstream encoding

pub mod entities;
pub mod pipeline;
pub mod reference;
pub mod services;

pub use pipeline::{Pipeline, RunSummary};
pub use reference::{ReferenceSnapshot, SourceRow};
pub use services::edit_cuts::{invert_cuts, CutInstruction, EditInstructions};
