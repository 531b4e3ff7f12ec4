//! Post-cleansing validation
//!
//! Checks that only make sense after reference resolution and lineage
//! flagging. Each check yields a categorized failure; the first failing
//! check decides the item. Reference-data misses are reported separately
//! from malformed-filename completeness failures so operators can tell
//! "fix the data" from "fix the file".

use crate::entities::{FailureCategory, ProcessedRecording, VersionType};

const MIN_CASE_REFERENCE_LEN: usize = 9;
const MAX_CASE_REFERENCE_LEN: usize = 24;

pub struct DataValidator;

impl DataValidator {
    /// Returns the first failure, or `None` when the recording is valid.
    pub fn validate(recording: &ProcessedRecording) -> Option<(FailureCategory, String)> {
        if recording.court_id.is_none() {
            return Some((
                FailureCategory::MissingData,
                format!(
                    "court reference '{}' not found in site reference data",
                    recording.court_reference
                ),
            ));
        }

        let case_ref = recording.case_reference.trim();
        if case_ref.is_empty() {
            return Some((
                FailureCategory::MissingData,
                "no usable case reference derived from URN or exhibit".into(),
            ));
        }
        if case_ref.len() < MIN_CASE_REFERENCE_LEN || case_ref.len() > MAX_CASE_REFERENCE_LEN {
            return Some((
                FailureCategory::MissingData,
                format!(
                    "case reference '{}' length {} outside {}..={}",
                    case_ref,
                    case_ref.len(),
                    MIN_CASE_REFERENCE_LEN,
                    MAX_CASE_REFERENCE_LEN
                ),
            ));
        }

        if !recording.is_preferred {
            return Some((
                FailureCategory::AlternativeAvailable,
                "a better candidate file exists for this archive".into(),
            ));
        }

        if recording.version_type == VersionType::Copy && !recording.is_most_recent {
            return Some((
                FailureCategory::NotMostRecent,
                format!(
                    "version {} is superseded in its lineage",
                    recording.version_number
                ),
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn recording() -> ProcessedRecording {
        ProcessedRecording {
            archive_id: "a1".into(),
            archive_name: "f.mp4".into(),
            court_reference: "Leeds".into(),
            court_id: Some(Uuid::new_v4()),
            court_name: "Leeds Crown Court".into(),
            case_reference: "12AB345678".into(),
            urn: "12AB345678".into(),
            exhibit_reference: String::new(),
            defendant_last_name: "Smith".into(),
            witness_first_name: "John".into(),
            recording_timestamp: Utc::now(),
            duration_secs: 120,
            version_type: VersionType::Original,
            version_number: "1".into(),
            orig_version_number: "1".into(),
            copy_version_number: None,
            is_most_recent: true,
            is_preferred: true,
            file_extension: "mp4".into(),
            file_name: "f.mp4".into(),
            share_contacts: Vec::new(),
        }
    }

    #[test]
    fn valid_recording_passes() {
        assert!(DataValidator::validate(&recording()).is_none());
    }

    #[test]
    fn unresolved_court_is_a_reference_data_failure() {
        let mut rec = recording();
        rec.court_id = None;
        let (category, message) = DataValidator::validate(&rec).unwrap();
        assert_eq!(category, FailureCategory::MissingData);
        assert!(message.contains("site reference data"));
    }

    #[test]
    fn case_reference_length_is_bounded() {
        let mut rec = recording();
        rec.case_reference = "SHORT".into();
        assert!(DataValidator::validate(&rec).is_some());

        rec.case_reference = "X".repeat(25);
        assert!(DataValidator::validate(&rec).is_some());

        rec.case_reference = "X".repeat(24);
        assert!(DataValidator::validate(&rec).is_none());
    }

    #[test]
    fn non_preferred_recording_is_alternative_available() {
        let mut rec = recording();
        rec.is_preferred = false;
        let (category, _) = DataValidator::validate(&rec).unwrap();
        assert_eq!(category, FailureCategory::AlternativeAvailable);
    }

    #[test]
    fn superseded_copy_is_not_most_recent() {
        let mut rec = recording();
        rec.version_type = VersionType::Copy;
        rec.version_number = "2".into();
        rec.is_most_recent = false;
        let (category, _) = DataValidator::validate(&rec).unwrap();
        assert_eq!(category, FailureCategory::NotMostRecent);

        // ORIGINALs are never rejected for recency.
        rec.version_type = VersionType::Original;
        assert!(DataValidator::validate(&rec).is_none());
    }
}
