//! Failure taxonomy and reporting records
//!
//! Failures are categories, not exception types. Every item failure is
//! caught at the item boundary, categorized and forwarded to the tracker;
//! a single item never aborts the run.

use crate::entities::archive::RawArchiveItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    /// No filename pattern matched. Unrecoverable for the item.
    PatternMatch,
    /// Recording predates the go-live date.
    PreGoLive,
    /// Archive marked as pre-existing in the target system.
    PreExisting,
    /// Required extracted fields missing.
    MissingData,
    /// Extension outside the allowed media set (raw capture files included).
    InvalidExtension,
    /// Idempotent no-op: archive id already migrated successfully.
    AlreadyMigrated,
    /// COPY item whose case was never originated by an ORIGINAL.
    MissingCaseForCopy,
    /// COPY item with no tracked ORIGINAL in its lineage.
    NoOriginalFound,
    /// ORIGINAL tracked but its persisted recording id is still null.
    OriginalMissingRecordingId,
    /// Authoritative case contains a deleted participant. Skipped, not retried.
    DeletedParticipant,
    /// A later version of this recording exists in the lineage.
    NotMostRecent,
    /// A better candidate file exists for the same archive.
    AlternativeAvailable,
    General,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatternMatch => "PATTERN_MATCH_FAILURE",
            Self::PreGoLive => "PREDATES_GO_LIVE",
            Self::PreExisting => "PRE_EXISTING",
            Self::MissingData => "MISSING_REQUIRED_FIELD",
            Self::InvalidExtension => "INVALID_EXTENSION",
            Self::AlreadyMigrated => "ALREADY_MIGRATED",
            Self::MissingCaseForCopy => "MISSING_CASE_FOR_COPY",
            Self::NoOriginalFound => "NO_ORIGINAL_FOUND",
            Self::OriginalMissingRecordingId => "ORIGINAL_MISSING_RECORDING_ID",
            Self::DeletedParticipant => "DELETED_PARTICIPANT_GUARD",
            Self::NotMostRecent => "NOT_MOST_RECENT",
            Self::AlternativeAvailable => "ALTERNATIVE_AVAILABLE",
            Self::General => "GENERAL_ERROR",
        }
    }
}

/// An archive item diverted to the test-classification track. Not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestItem {
    pub archive_id: String,
    pub archive_name: String,
    pub reason: String,
    pub duration_secs: u32,
    pub failed_duration_check: bool,
    pub failed_keyword_check: bool,
    pub keywords_found: Vec<String>,
    /// True when a dedicated test filename pattern matched.
    pub matched_test_pattern: bool,
}

/// A categorized per-item failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedItem {
    pub archive_id: String,
    pub archive_name: String,
    pub category: FailureCategory,
    pub message: String,
}

impl FailedItem {
    pub fn new(item: &RawArchiveItem, category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            archive_id: item.archive_id.clone(),
            archive_name: item.archive_name.clone(),
            category,
            message: message.into(),
        }
    }
}

/// An extracted item flagged for operator attention (still migrated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyItem {
    pub archive_id: String,
    pub archive_name: String,
    pub reason: String,
}
