//! Clock-time parsing and formatting
//!
//! Edit instructions carry timestamps as `HH:MM:SS` strings. Parsing is
//! strict: exactly two digits per field, minutes and seconds below 60.

use crate::{Error, Result};

/// Parse a strict `HH:MM:SS` timestamp into total seconds.
pub fn parse_hms(value: &str) -> Result<i64> {
    let bytes = value.as_bytes();
    if bytes.len() != 8 || bytes[2] != b':' || bytes[5] != b':' {
        return Err(Error::InvalidInput(format!(
            "invalid timestamp '{}': expected HH:MM:SS",
            value
        )));
    }

    let field = |range: std::ops::Range<usize>| -> Result<i64> {
        let s = &value[range];
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "invalid timestamp '{}': expected HH:MM:SS",
                value
            )));
        }
        s.parse::<i64>().map_err(|e| {
            Error::InvalidInput(format!("invalid timestamp '{}': {}", value, e))
        })
    };

    let hours = field(0..2)?;
    let minutes = field(3..5)?;
    let seconds = field(6..8)?;

    if minutes > 59 || seconds > 59 {
        return Err(Error::InvalidInput(format!(
            "invalid timestamp '{}': minutes and seconds must be below 60",
            value
        )));
    }

    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Format total seconds as `HH:MM:SS`.
pub fn format_hms(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
