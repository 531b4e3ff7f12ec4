//! Raw inventory rows from the decommissioned recording platform

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Epoch values below this are seconds, above it milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

static TRAILING_QC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_\s]QC\d*$").expect("valid regex"));
static TRAILING_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_\s]?(?:CP-Case|AS URN)[-_\s]?$").expect("valid regex"));
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_\s]{2,}").expect("valid regex"));

/// One row of source inventory. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArchiveItem {
    pub archive_id: String,
    pub archive_name: String,
    /// Unix epoch, seconds or milliseconds (source data carries both).
    pub create_time_epoch: Option<i64>,
    pub duration_secs: u32,
    pub file_name: String,
    pub file_size_mb: f64,
    /// Watermark flag from the sidecar metadata, when the inventory
    /// extraction supplied one.
    #[serde(default)]
    pub has_watermark: bool,
}

impl RawArchiveItem {
    pub fn create_time(&self) -> Option<DateTime<Utc>> {
        let epoch = self.create_time_epoch.filter(|e| *e > 0)?;
        let millis = if epoch < EPOCH_MILLIS_THRESHOLD {
            epoch * 1000
        } else {
            epoch
        };
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Archive name with its extension removed.
    pub fn archive_name_no_ext(&self) -> &str {
        match self.archive_name.rfind('.') {
            Some(idx) => &self.archive_name[..idx],
            None => &self.archive_name,
        }
    }

    /// Cleans the archive name before pattern matching: strips QC markers,
    /// trailing "CP-Case"/"AS URN" tokens and a trailing underscore, then
    /// collapses separator runs to a single hyphen.
    pub fn sanitized_name(&self) -> String {
        sanitize_archive_name(&self.archive_name)
    }
}

pub fn sanitize_archive_name(archive_name: &str) -> String {
    if archive_name.is_empty() {
        return String::new();
    }

    // Split off the extension so the trailing rules only see the stem.
    let (stem, ext) = match archive_name.rfind('.') {
        Some(idx) if archive_name[idx + 1..].chars().all(|c| c.is_ascii_alphanumeric()) => {
            (&archive_name[..idx], &archive_name[idx..])
        }
        _ => (archive_name, ""),
    };

    let mut stem = stem.to_string();

    // Leading QC marker, optionally followed by one underscore or digit.
    if let Some(rest) = stem.strip_prefix("QC") {
        let rest = match rest.as_bytes().first() {
            Some(b'_') => &rest[1..],
            Some(b) if b.is_ascii_digit() => &rest[1..],
            _ => rest,
        };
        stem = rest.to_string();
    }

    stem = TRAILING_QC.replace(&stem, "").into_owned();
    stem = TRAILING_NOISE.replace(&stem, "").into_owned();
    if stem.ends_with('_') {
        stem.pop();
    }

    let mut sanitized = format!("{}{}", stem, ext);
    sanitized = SEPARATOR_RUNS.replace_all(&sanitized, "-").into_owned();
    sanitized.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> RawArchiveItem {
        RawArchiveItem {
            archive_id: "a1".into(),
            archive_name: name.into(),
            create_time_epoch: Some(1_700_000_000),
            duration_secs: 120,
            file_name: name.into(),
            file_size_mb: 10.0,
            has_watermark: false,
        }
    }

    #[test]
    fn strips_leading_qc_marker() {
        assert_eq!(
            item("QC_Leeds-200101-12AB345678-Smith-John-ORIG.mp4").sanitized_name(),
            "Leeds-200101-12AB345678-Smith-John-ORIG.mp4"
        );
        assert_eq!(item("QC2-Leeds-Smith.mp4").sanitized_name(), "-Leeds-Smith.mp4");
    }

    #[test]
    fn strips_trailing_qc_and_noise_tokens() {
        assert_eq!(
            item("Leeds-200101-12AB345678-Smith-John-ORIG_QC2.mp4").sanitized_name(),
            "Leeds-200101-12AB345678-Smith-John-ORIG.mp4"
        );
        assert_eq!(
            item("Leeds-200101-12AB345678-Smith-John-ORIG-CP-Case.mp4").sanitized_name(),
            "Leeds-200101-12AB345678-Smith-John-ORIG.mp4"
        );
    }

    #[test]
    fn collapses_separator_runs_and_trailing_underscore() {
        assert_eq!(
            item("Leeds--200101__12AB345678-Smith-John-ORIG_.mp4").sanitized_name(),
            "Leeds-200101-12AB345678-Smith-John-ORIG.mp4"
        );
    }

    #[test]
    fn epoch_seconds_and_millis_both_resolve() {
        let secs = item("x.mp4");
        let mut millis = item("x.mp4");
        millis.create_time_epoch = Some(1_700_000_000_000);
        assert_eq!(secs.create_time(), millis.create_time());
        let mut none = item("x.mp4");
        none.create_time_epoch = Some(0);
        assert!(none.create_time().is_none());
    }
}
