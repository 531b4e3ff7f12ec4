//! Configuration loading for migration runs
//!
//! Runtime tuning for the batch pipeline lives in a TOML file. Every field
//! has a compiled default so an empty (or absent) file yields a usable
//! configuration.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// Migration run configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Recordings created before this date are rejected outright.
    pub go_live_date: NaiveDate,

    /// Items shorter than this are classified as test recordings.
    pub min_recording_duration_secs: u32,

    /// Case-insensitive substrings that mark a test recording.
    pub test_keywords: Vec<String>,

    /// Playable media extensions accepted for migration.
    pub allowed_extensions: Vec<String>,

    /// Upper bound on concurrently processed archive items.
    pub max_workers: usize,

    /// Email of the system user recorded as having operated the
    /// migrated capture sessions.
    pub ingest_user_email: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            go_live_date: NaiveDate::from_ymd_opt(2019, 5, 23)
                .expect("valid compiled go-live date"),
            min_recording_duration_secs: 10,
            test_keywords: [
                "test", "demo", "unknown", "training", "t35t", "sample", "mock",
                "dummy", "example", "playback", "predefined", "failover",
                "support", "wrong",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowed_extensions: vec!["mp4".to_string()],
            max_workers: 4,
            ingest_user_email: "migration@local".to_string(),
        }
    }
}

impl MigrationConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// True when the filename contains any configured test keyword.
    pub fn matched_test_keywords(&self, name: &str) -> Vec<&str> {
        let lower = name.to_lowercase();
        self.test_keywords
            .iter()
            .filter(|kw| lower.contains(kw.as_str()))
            .map(|kw| kw.as_str())
            .collect()
    }

    /// True when `ext` (without the dot) is an accepted media extension.
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let lower = ext.to_lowercase();
        self.allowed_extensions.iter().any(|e| e == &lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_usable() {
        let config = MigrationConfig::default();
        assert_eq!(config.min_recording_duration_secs, 10);
        assert!(config.is_allowed_extension("mp4"));
        assert!(config.is_allowed_extension("MP4"));
        assert!(!config.is_allowed_extension("raw"));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let config = MigrationConfig::default();
        let found = config.matched_test_keywords("Courtroom-TEST-run.mp4");
        assert_eq!(found, vec!["test"]);
        assert!(config.matched_test_keywords("ordinary-recording.mp4").is_empty());
    }

    #[test]
    fn load_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "go_live_date = \"2020-01-01\"\nmin_recording_duration_secs = 30"
        )
        .unwrap();

        let config = MigrationConfig::load(file.path()).unwrap();
        assert_eq!(
            config.go_live_date,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );
        assert_eq!(config.min_recording_duration_secs, 30);
        // untouched fields fall back to defaults
        assert!(config.is_allowed_extension("mp4"));
    }
}
