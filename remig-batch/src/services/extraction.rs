//! Metadata extraction from archive inventory rows
//!
//! Wraps the pattern matcher's captures plus source-file attributes into an
//! `ExtractedMetadata` record. Checks run in a fixed order; the first
//! failing check decides the item's fate. Test classification is a
//! diversion, not an error.

use crate::entities::{ExtractedMetadata, FailureCategory, RawArchiveItem, TestItem, VersionType};
use crate::services::pattern::{self, FilenameMatch, MatchFields};
use remig_common::MigrationConfig;
use tracing::debug;

/// Outcome of extracting one archive item.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Extracted(ExtractedMetadata),
    Test(TestItem),
    Failed {
        category: FailureCategory,
        message: String,
    },
}

pub struct MetadataExtractor {
    config: MigrationConfig,
}

impl MetadataExtractor {
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    pub fn process(&self, item: &RawArchiveItem) -> ExtractionOutcome {
        let sanitized = item.sanitized_name();
        debug!(archive_id = %item.archive_id, sanitized = %sanitized, "extracting metadata");

        // Archives already present in the target system carry a PRE marker.
        if item.archive_name.to_uppercase().contains("-PRE-") {
            return ExtractionOutcome::Failed {
                category: FailureCategory::PreExisting,
                message: "keyword 'PRE' found in archive name".into(),
            };
        }

        let Some(create_time) = item.create_time() else {
            return ExtractionOutcome::Failed {
                category: FailureCategory::PreGoLive,
                message: "missing or unparseable creation time".into(),
            };
        };
        if create_time.date_naive() < self.config.go_live_date {
            return ExtractionOutcome::Failed {
                category: FailureCategory::PreGoLive,
                message: format!(
                    "recording date {} is before the go-live date {}",
                    create_time.date_naive(),
                    self.config.go_live_date
                ),
            };
        }

        if let Some(test) = self.classify_test(item, &sanitized) {
            return ExtractionOutcome::Test(test);
        }

        // Raw capture dumps are rejected outright, whatever their name shape.
        if item.archive_name.to_lowercase().contains(".raw") {
            return ExtractionOutcome::Failed {
                category: FailureCategory::InvalidExtension,
                message: "raw capture file".into(),
            };
        }

        let fields = match pattern::match_filename(&sanitized) {
            None => {
                debug!(archive_id = %item.archive_id, "no pattern matched");
                return ExtractionOutcome::Failed {
                    category: FailureCategory::PatternMatch,
                    message: "failed to match any recording pattern".into(),
                };
            }
            Some(FilenameMatch::Test { pattern_name }) => {
                return ExtractionOutcome::Test(TestItem {
                    archive_id: item.archive_id.clone(),
                    archive_name: item.archive_name.clone(),
                    reason: format!("matched test filename pattern '{pattern_name}'"),
                    duration_secs: item.duration_secs,
                    failed_duration_check: false,
                    failed_keyword_check: false,
                    keywords_found: Vec::new(),
                    matched_test_pattern: true,
                });
            }
            Some(FilenameMatch::Recording {
                pattern_name,
                fields,
            }) => {
                debug!(archive_id = %item.archive_id, pattern = pattern_name, "pattern matched");
                fields
            }
        };

        self.build_metadata(item, fields)
    }

    /// Keyword and duration checks are evaluated independently; an item can
    /// fail both, and the reasons are concatenated.
    fn classify_test(&self, item: &RawArchiveItem, sanitized: &str) -> Option<TestItem> {
        let keywords: Vec<String> = self
            .config
            .matched_test_keywords(sanitized)
            .into_iter()
            .map(str::to_string)
            .collect();
        let keyword_hit = !keywords.is_empty();
        let duration_hit = item.duration_secs < self.config.min_recording_duration_secs;

        if !keyword_hit && !duration_hit {
            return None;
        }

        let mut reasons = Vec::new();
        if keyword_hit {
            reasons.push("test keywords in archive name".to_string());
        }
        if duration_hit {
            reasons.push(format!(
                "duration is less than {} seconds",
                self.config.min_recording_duration_secs
            ));
        }

        Some(TestItem {
            archive_id: item.archive_id.clone(),
            archive_name: item.archive_name.clone(),
            reason: reasons.join("; "),
            duration_secs: item.duration_secs,
            failed_duration_check: duration_hit,
            failed_keyword_check: keyword_hit,
            keywords_found: keywords,
            matched_test_pattern: false,
        })
    }

    fn build_metadata(&self, item: &RawArchiveItem, fields: MatchFields) -> ExtractionOutcome {
        let version_type = VersionType::normalize(&fields.version_type);

        let mut missing = Vec::new();
        if fields.court.trim().is_empty() {
            missing.push("court reference");
        }
        if fields.urn.trim().is_empty() && fields.exhibit.trim().is_empty() {
            missing.push("URN and exhibit reference");
        }
        if fields.defendant.trim().is_empty() {
            missing.push("defendant last name");
        }
        if fields.witness.trim().is_empty() {
            missing.push("witness first name");
        }
        if version_type.is_none() {
            missing.push("recording version");
        }
        if !missing.is_empty() {
            return ExtractionOutcome::Failed {
                category: FailureCategory::MissingData,
                message: format!("missing required metadata fields: {}", missing.join(", ")),
            };
        }
        let version_type = version_type.expect("checked above");

        let mut extension = fields.ext.to_lowercase();
        if extension.is_empty() && item.archive_name.to_lowercase().ends_with(".mp4") {
            extension = "mp4".into();
        }
        if !self.config.is_allowed_extension(&extension) {
            return ExtractionOutcome::Failed {
                category: FailureCategory::InvalidExtension,
                message: format!("extension '{}' is not an allowed media type", extension),
            };
        }

        // Originals without an explicit number are version 1.
        let mut version_number = fields.version_number.trim().to_string();
        if version_type == VersionType::Original && version_number.is_empty() {
            version_number = "1".into();
        }

        ExtractionOutcome::Extracted(ExtractedMetadata {
            court_reference: fields.court,
            date_pattern: fields.date,
            urn: fields.urn,
            exhibit_reference: fields.exhibit,
            defendant_last_name: fields.defendant,
            witness_first_name: fields.witness,
            version_type,
            version_number,
            file_extension: extension,
            create_time: item.create_time(),
            duration_secs: item.duration_secs,
            file_name: item.file_name.clone(),
            file_size_mb: item.file_size_mb,
            archive_id: item.archive_id.clone(),
            archive_name: item.archive_name.clone(),
        })
    }
}
