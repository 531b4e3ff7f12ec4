//! Data model for the migration pipeline
//!
//! Flows strictly downward: `RawArchiveItem` -> `ExtractedMetadata` ->
//! `ProcessedRecording` -> `MigratedItemGroup`. Failures at any stage are
//! classified into a `FailureCategory` and reported, never thrown.

pub mod archive;
pub mod graph;
pub mod metadata;
pub mod outcome;

pub use archive::RawArchiveItem;
pub use graph::{
    CaseOutcome, CaseState, CreateBooking, CreateCaptureSession, CreateCase, CreateParticipant,
    CreateRecording, CreateShareBooking, MigratedItemGroup, ParticipantType,
};
pub use metadata::{
    compare_version_strings, ExtractedMetadata, ProcessedRecording, ShareContact, VersionType,
};
pub use outcome::{FailedItem, FailureCategory, NotifyItem, TestItem};
