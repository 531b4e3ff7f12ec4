//! Duplicate-archive file selection
//!
//! Some archives carry two media files for the same recording. Selection
//! between them runs a fixed five-rule tie-break chain; the order is load
//! bearing because downstream reports record which rule decided, so the
//! chain must not be reordered or collapsed.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One media file attached to an archive entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFile {
    pub file_name: String,
    pub file_size_mb: f64,
    pub duration_secs: u32,
    pub has_watermark: bool,
}

/// Which tie-break rule decided the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionRule {
    Watermark,
    UgcName,
    LargerFile,
    DurationCloseness,
    LongerName,
    Fallback,
}

impl SelectionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watermark => "WATERMARK",
            Self::UgcName => "UGC_NAME",
            Self::LargerFile => "LARGER_FILE",
            Self::DurationCloseness => "DURATION_CLOSENESS",
            Self::LongerName => "LONGER_NAME",
            Self::Fallback => "FALLBACK",
        }
    }
}

/// Outcome of a pairwise selection: index into the input pair plus the
/// rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub rule: SelectionRule,
}

/// Pick between two candidate files for the same archive entry.
///
/// Rules fire in order; each rule only decides when it distinguishes the
/// pair, otherwise the next rule runs. The final fallback keeps the second
/// file, matching historical report output.
pub fn select_between(
    first: &CandidateFile,
    second: &CandidateFile,
    expected_duration_secs: u32,
) -> Selection {
    let selection = decide(first, second, expected_duration_secs);
    debug!(
        chosen = %[first, second][selection.index].file_name,
        rule = selection.rule.as_str(),
        "selected between duplicate archive files"
    );
    selection
}

fn decide(first: &CandidateFile, second: &CandidateFile, expected_duration_secs: u32) -> Selection {
    if first.has_watermark != second.has_watermark {
        let index = if first.has_watermark { 0 } else { 1 };
        return Selection {
            index,
            rule: SelectionRule::Watermark,
        };
    }

    let first_ugc = first.file_name.to_uppercase().contains("UGC");
    let second_ugc = second.file_name.to_uppercase().contains("UGC");
    if first_ugc != second_ugc {
        let index = if first_ugc { 0 } else { 1 };
        return Selection {
            index,
            rule: SelectionRule::UgcName,
        };
    }

    if first.file_size_mb != second.file_size_mb {
        let index = if first.file_size_mb > second.file_size_mb {
            0
        } else {
            1
        };
        return Selection {
            index,
            rule: SelectionRule::LargerFile,
        };
    }

    let first_gap = first.duration_secs.abs_diff(expected_duration_secs);
    let second_gap = second.duration_secs.abs_diff(expected_duration_secs);
    if first_gap != second_gap {
        let index = if first_gap < second_gap { 0 } else { 1 };
        return Selection {
            index,
            rule: SelectionRule::DurationCloseness,
        };
    }

    if first.file_name.len() != second.file_name.len() {
        let index = if first.file_name.len() > second.file_name.len() {
            0
        } else {
            1
        };
        return Selection {
            index,
            rule: SelectionRule::LongerName,
        };
    }

    Selection {
        index: 1,
        rule: SelectionRule::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, size: f64, duration: u32, watermark: bool) -> CandidateFile {
        CandidateFile {
            file_name: name.into(),
            file_size_mb: size,
            duration_secs: duration,
            has_watermark: watermark,
        }
    }

    #[test]
    fn watermark_wins_over_everything() {
        let a = candidate("small.mp4", 1.0, 50, true);
        let b = candidate("big-UGC-long-name.mp4", 900.0, 120, false);
        let sel = select_between(&a, &b, 120);
        assert_eq!(sel.index, 0);
        assert_eq!(sel.rule, SelectionRule::Watermark);
    }

    #[test]
    fn ugc_substring_decides_when_watermarks_tie() {
        let a = candidate("recording.mp4", 1.0, 120, false);
        let b = candidate("recording-ugc.mp4", 1.0, 120, false);
        let sel = select_between(&a, &b, 120);
        assert_eq!(sel.index, 1);
        assert_eq!(sel.rule, SelectionRule::UgcName);
    }

    #[test]
    fn larger_file_decides_next() {
        let a = candidate("a.mp4", 250.0, 120, false);
        let b = candidate("b.mp4", 120.0, 120, false);
        let sel = select_between(&a, &b, 120);
        assert_eq!(sel.index, 0);
        assert_eq!(sel.rule, SelectionRule::LargerFile);
    }

    #[test]
    fn duration_closeness_decides_when_sizes_tie() {
        let a = candidate("a.mp4", 100.0, 90, false);
        let b = candidate("b.mp4", 100.0, 119, false);
        let sel = select_between(&a, &b, 120);
        assert_eq!(sel.index, 1);
        assert_eq!(sel.rule, SelectionRule::DurationCloseness);
    }

    #[test]
    fn longer_filename_decides_when_durations_tie() {
        let a = candidate("recording-final.mp4", 100.0, 120, false);
        let b = candidate("rec.mp4", 100.0, 120, false);
        let sel = select_between(&a, &b, 120);
        assert_eq!(sel.index, 0);
        assert_eq!(sel.rule, SelectionRule::LongerName);
    }

    #[test]
    fn full_tie_falls_back_to_the_second_file() {
        let a = candidate("aaaa.mp4", 100.0, 120, false);
        let b = candidate("bbbb.mp4", 100.0, 120, false);
        let sel = select_between(&a, &b, 120);
        assert_eq!(sel.index, 1);
        assert_eq!(sel.rule, SelectionRule::Fallback);
    }
}
