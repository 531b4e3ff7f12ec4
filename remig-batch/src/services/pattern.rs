//! Filename pattern matching
//!
//! A fixed, ordered list of named patterns is tried against the sanitized
//! archive name; the first match wins. Ordering is a deliberate tie-break:
//! later patterns are looser and would over-match specific cases. All
//! patterns expose the same named capture groups; a group absent in a
//! given pattern yields an empty string.
//!
//! Dedicated test patterns (room checks, digit-only dumps, session UUIDs)
//! are consulted first; a test match classifies the item as a test
//! recording before the recording patterns are tried.

use once_cell::sync::Lazy;
use regex::Regex;

// Shared pattern components.
const SEP1: &str = r"[-_\s]+";
const SEP0: &str = r"[-_\s]?";
const COURT: &str = r"(?P<court>[A-Za-z]+)";
const DATE: &str = r"(?P<date>\d{6}|\d{2}-\d{2}-\d{4}-\d{4}|\d{2}-\d{2}-\d{4}|\d{2}/\d{2}/\d{4})";
const URN: &str = r"(?P<urn>[A-Za-z0-9]{2,14})";
const EXHIBIT: &str = r"(?P<exhibit>[A-Za-z][A-Za-z0-9]{6,9})";
const VERSION: &str =
    r"(?:(?P<version_type>ORIG|COPY|CPY|ORG|ORI|OR|CO|COP)(?:[-_\s]*(?P<version_number>\d+(?:\.\d+)?))?)?";
const EXT: &str = r"(?:\.(?P<ext>(?i:mp4|raw)))?";

/// Tokens that must never land in the exhibit slot. The sanitizer strips
/// them from name edges; this guards embedded occurrences.
const NOISE_TOKENS: &[&str] = &["QC", "CPCASE", "CP-CASE", "ASURN", "AS-URN"];

/// Second reference in a double-URN name; shaped digits-letters-digits.
const URN_SHAPE: &str = r"\d+[A-Za-z]{1,2}\d+";

fn names() -> String {
    format!(
        r"(?P<defendant>[A-Za-z']+(?:[-\s][A-Za-z0-9&]+)*){SEP1}(?P<witness>[A-Za-z0-9&']+(?:[-'\s][A-Za-z]+)*)"
    )
}

fn compile(pattern: String) -> Regex {
    Regex::new(&pattern).expect("valid compiled filename pattern")
}

/// Recording patterns, most specific first.
static RECORDING_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let names = names();
    vec![
        (
            "Standard",
            compile(format!(
                "^{COURT}{SEP1}{DATE}{SEP1}{URN}{SEP1}(?:{EXHIBIT}{SEP1})?{names}{SEP1}{VERSION}{EXT}$"
            )),
        ),
        (
            "StandardWithNumbers",
            compile(format!(
                r"^{COURT}{SEP1}{DATE}{SEP1}(?:\d{{1,5}}[-_\s])?{URN}{SEP1}(?:{EXHIBIT}{SEP1})?{names}{SEP1}{VERSION}{EXT}$"
            )),
        ),
        (
            "SpecificT",
            compile(format!(
                "^{COURT}{SEP1}{DATE}{SEP1}{URN}{SEP1}{EXHIBIT}{SEP1}{names}{SEP1}{VERSION}{EXT}$"
            )),
        ),
        (
            // Legacy 5-digit date variant with an optional trailing QC tag.
            "SpecialCase",
            compile(format!(
                r"^{COURT}{SEP1}(?P<date>\d{{5}}){SEP1}{URN}{SEP1}{EXHIBIT}{SEP1}{names}{SEP1}{VERSION}(?:_QC)?{EXT}$"
            )),
        ),
        (
            "DoubleUrn",
            compile(format!(
                "^{COURT}{SEP1}{DATE}{SEP1}{URN}{SEP1}(?:{URN_SHAPE}){SEP1}{names}{SEP1}{VERSION}{EXT}$"
            )),
        ),
        (
            "DoubleExhibit",
            compile(format!(
                r"^{COURT}{SEP1}{DATE}{SEP1}{EXHIBIT}{SEP1}(?:[A-Za-z]*\d+){SEP1}{names}{SEP1}{VERSION}{EXT}$"
            )),
        ),
        (
            "Prefix",
            compile(format!(
                r"^(?:(?:S28|NEW|QC)[_\s-]+)?{COURT}{SEP1}{DATE}{SEP1}{URN}{SEP1}(?:{EXHIBIT}{SEP1})?{names}{SEP1}{VERSION}{EXT}$"
            )),
        ),
        (
            // Catch-all: a long reference run split into URN plus an
            // 11-character second reference, separators optional.
            "Flexible",
            compile(format!(
                r"^{COURT}{SEP1}{DATE}{SEP0}{URN}(?:[A-Za-z0-9]{{11}}){SEP0}(?:{EXHIBIT}{SEP0})?{names}{SEP0}{VERSION}{EXT}$"
            )),
        ),
    ]
});

/// Filenames that identify test recordings outright.
static TEST_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let p = |s: &str| Regex::new(&format!("(?i){s}")).expect("valid compiled test pattern");
    vec![
        ("DigitOnlyExt", p(r"^\d+(?:_\d+)*\.mp4$")),
        ("DigitOnlyNoExt", p(r"^\d+(?:_\d+)+$")),
        (
            "S28RoomCheck",
            p(r"^S?28.*?(?:VMR\d+)?[_\s-]*\d{9,20}.*(?:\.(?:mp4|raw|mov|avi|mkv))?$"),
        ),
        (
            "MorningChecks",
            p(r"^\s*(?:SNOW|S?28)\s+Morning\s+Checks\s+(?:\d{8}|\d{4}\s*\d{2}\s*\d{2}|\d{2}[-/ ]\d{2}[-/ ]\d{4})\s*(?:VMR\d+)?(?:\.mp4)?\s*$"),
        ),
        ("VmrTimestamp", p(r"^[A-Z\s]+VMR_\d{15,21}$")),
        ("VmrSimple", p(r"^vmr\.[a-z]+_\d{18}(?:\.(?:mp4|raw|mov|avi|mkv))?$")),
        (
            "SessionUuid",
            p(r"^[A-Za-z0-9]+_\d{15}_\d+_[0-9a-f]{32}(?:\.(?:mp4|mov|avi|mkv))?$"),
        ),
        (
            "HexSession",
            p(r"^0x[A-Fa-f0-9]+_[A-Za-z0-9]+_\d+_\d+_[A-Fa-f0-9]+(?:\.(?:mp4|raw|mov|avi|mkv))?$"),
        ),
        ("RPrefixUuid", p(r"^R[a-f0-9]{32}$")),
        ("Batch", p(r"^\s*batch\s*\d+_\d{17,20}\s*$")),
        ("NoDigits", p(r"^[^\d]+\.mp4$")),
    ]
});

/// Named fields shared by every recording pattern. Groups absent from the
/// matched pattern are empty strings, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFields {
    pub court: String,
    pub date: String,
    pub urn: String,
    pub exhibit: String,
    pub defendant: String,
    pub witness: String,
    pub version_type: String,
    pub version_number: String,
    pub ext: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilenameMatch {
    /// Matched a dedicated test pattern; the item is a test recording.
    Test { pattern_name: &'static str },
    /// Matched a recording pattern with extracted fields.
    Recording {
        pattern_name: &'static str,
        fields: MatchFields,
    },
}

/// Try the ordered pattern sets against a sanitized archive name.
/// Test patterns are consulted first; `None` is a definitive no-match.
pub fn match_filename(sanitized: &str) -> Option<FilenameMatch> {
    if let Some(pattern_name) = match_test_pattern(sanitized) {
        return Some(FilenameMatch::Test { pattern_name });
    }
    match_recording_pattern(sanitized).map(|(pattern_name, fields)| FilenameMatch::Recording {
        pattern_name,
        fields,
    })
}

pub fn match_test_pattern(sanitized: &str) -> Option<&'static str> {
    TEST_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(sanitized))
        .map(|(name, _)| *name)
}

pub fn match_recording_pattern(sanitized: &str) -> Option<(&'static str, MatchFields)> {
    static URN_SHAPED: Lazy<Regex> =
        Lazy::new(|| Regex::new(&format!("^{URN_SHAPE}$")).expect("valid regex"));

    for (name, regex) in RECORDING_PATTERNS.iter() {
        let Some(caps) = regex.captures(sanitized) else {
            continue;
        };
        let fields = extract_fields(regex, &caps);

        // The exhibit slot must hold a real reference, not a noise token,
        // and in the double-exhibit form it must not be URN-shaped.
        if !fields.exhibit.is_empty() {
            let upper = fields.exhibit.to_uppercase();
            if NOISE_TOKENS.contains(&upper.as_str()) {
                continue;
            }
            if *name == "DoubleExhibit" && URN_SHAPED.is_match(&fields.exhibit) {
                continue;
            }
        }

        return Some((name, fields));
    }
    None
}

fn extract_fields(regex: &Regex, caps: &regex::Captures<'_>) -> MatchFields {
    let get = |group: &str| -> String {
        if regex.capture_names().flatten().any(|n| n == group) {
            caps.name(group)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        } else {
            String::new()
        }
    };

    MatchFields {
        court: get("court"),
        date: get("date"),
        urn: get("urn"),
        exhibit: get("exhibit"),
        defendant: get("defendant"),
        witness: get("witness"),
        version_type: get("version_type"),
        version_number: get("version_number"),
        ext: get("ext"),
    }
}
