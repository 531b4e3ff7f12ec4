//! Cleansing and reference resolution
//!
//! Turns an `ExtractedMetadata` into a `ProcessedRecording`: resolves the
//! court against the site snapshot, derives the case reference, splits
//! fractional COPY version numbers into their lineage and sub-version
//! parts, and attaches share contacts from the channel table.
//!
//! Lineage flags (`is_most_recent`, `is_preferred`) default to true here;
//! the pipeline refines them from the record store before validation.

use crate::entities::{ExtractedMetadata, FailureCategory, ProcessedRecording, VersionType};
use crate::reference::ReferenceSnapshot;
use tracing::debug;

pub struct DataTransformer<'a> {
    snapshot: &'a ReferenceSnapshot,
}

impl<'a> DataTransformer<'a> {
    pub fn new(snapshot: &'a ReferenceSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn transform(
        &self,
        meta: &ExtractedMetadata,
    ) -> Result<ProcessedRecording, (FailureCategory, String)> {
        let Some(create_time) = meta.create_time else {
            return Err((
                FailureCategory::General,
                "creation time lost between extraction and transformation".into(),
            ));
        };

        let court = self.snapshot.resolve_court(&meta.court_reference);
        if court.is_none() {
            debug!(
                court_reference = %meta.court_reference,
                "court reference absent from site snapshot"
            );
        }

        let case_reference = meta.case_reference();
        let (orig_version, copy_version) = split_version(meta.version_type, &meta.version_number);
        let share_contacts = self.snapshot.contacts_for_case(&case_reference);

        Ok(ProcessedRecording {
            archive_id: meta.archive_id.clone(),
            archive_name: meta.archive_name.clone(),
            court_reference: meta.court_reference.clone(),
            court_id: court.map(|c| c.id),
            court_name: court.map(|c| c.name.clone()).unwrap_or_default(),
            case_reference,
            urn: meta.urn.clone(),
            exhibit_reference: meta.exhibit_reference.clone(),
            defendant_last_name: meta.defendant_last_name.clone(),
            witness_first_name: meta.witness_first_name.clone(),
            recording_timestamp: create_time,
            duration_secs: meta.duration_secs,
            version_type: meta.version_type,
            version_number: meta.version_number.clone(),
            orig_version_number: orig_version,
            copy_version_number: copy_version,
            is_most_recent: true,
            is_preferred: true,
            file_extension: meta.file_extension.clone(),
            file_name: meta.file_name.clone(),
            share_contacts,
        })
    }
}

/// Split a possibly fractional version number into its whole lineage part
/// and sub-version part. ORIGINAL versions never carry a sub-version.
fn split_version(version_type: VersionType, version_number: &str) -> (String, Option<String>) {
    let trimmed = version_number.trim();
    match version_type {
        VersionType::Original => (trimmed.to_string(), None),
        VersionType::Copy => match trimmed.split_once('.') {
            Some((whole, sub)) if !sub.is_empty() => (whole.to_string(), Some(sub.to_string())),
            _ => (trimmed.to_string(), None),
        },
    }
}
