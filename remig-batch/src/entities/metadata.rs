//! Extracted and cleansed recording metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Recording-version classification extracted from the filename.
///
/// An ORIGINAL anchors a lineage; a COPY extends it. Legacy spelling
/// variants are folded in during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionType {
    Original,
    Copy,
}

impl VersionType {
    /// Normalize a raw filename token. Unrecognized tokens yield `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "ORIG" | "ORG" | "ORI" | "OR" => Some(Self::Original),
            "COPY" | "CPY" | "COP" | "CO" => Some(Self::Copy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "ORIG",
            Self::Copy => "COPY",
        }
    }
}

/// Compare dotted version strings numerically, segment by segment.
/// Missing segments count as zero, so "2" == "2.0" and "2.1" > "2".
pub fn compare_version_strings(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (pa, pb) = (parse(a), parse(b));
    let len = pa.len().max(pb.len());
    for i in 0..len {
        let (va, vb) = (
            pa.get(i).copied().unwrap_or(0),
            pb.get(i).copied().unwrap_or(0),
        );
        match va.cmp(&vb) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Output of pattern matching over a sanitized archive name, carrying the
/// raw file attributes forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub court_reference: String,
    /// Date token as captured from the filename (several legacy formats).
    pub date_pattern: String,
    pub urn: String,
    pub exhibit_reference: String,
    pub defendant_last_name: String,
    pub witness_first_name: String,
    pub version_type: VersionType,
    /// May carry a fractional sub-version, e.g. "2.1".
    pub version_number: String,
    pub file_extension: String,
    pub create_time: Option<DateTime<Utc>>,
    pub duration_secs: u32,
    pub file_name: String,
    pub file_size_mb: f64,
    pub archive_id: String,
    pub archive_name: String,
}

impl ExtractedMetadata {
    /// Derive the case reference: the URN when it is long enough to be a
    /// real reference, otherwise the exhibit reference, otherwise empty.
    pub fn case_reference(&self) -> String {
        let urn = self.urn.trim();
        let exhibit = self.exhibit_reference.trim();
        if urn.len() >= 9 {
            urn.to_string()
        } else if exhibit.len() >= 7 {
            exhibit.to_string()
        } else {
            String::new()
        }
    }

    pub fn archive_name_no_ext(&self) -> &str {
        match self.archive_name.rfind('.') {
            Some(idx) => &self.archive_name[..idx],
            None => &self.archive_name,
        }
    }
}

/// A contact resolved from the channel reference table, entitled to a
/// share of the migrated booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Cleansed, reference-resolved recording ready for entity reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecording {
    pub archive_id: String,
    pub archive_name: String,

    pub court_reference: String,
    pub court_id: Option<Uuid>,
    pub court_name: String,

    pub case_reference: String,
    pub urn: String,
    pub exhibit_reference: String,
    pub defendant_last_name: String,
    pub witness_first_name: String,

    pub recording_timestamp: DateTime<Utc>,
    pub duration_secs: u32,

    pub version_type: VersionType,
    pub version_number: String,
    /// Whole-version part of the lineage this item belongs to.
    pub orig_version_number: String,
    /// Sub-version for fractional COPY numbers, e.g. the "1" of "2.1".
    pub copy_version_number: Option<String>,
    pub is_most_recent: bool,
    pub is_preferred: bool,

    pub file_extension: String,
    pub file_name: String,

    pub share_contacts: Vec<ShareContact>,
}
