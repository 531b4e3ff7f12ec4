//! Edit cut-instruction translation
//!
//! Operators describe what to remove; the encoder needs to know what to
//! keep. This module inverts an ordered list of cut windows over a source
//! recording into keep windows, producing both a human-review list in
//! `HH:MM:SS` and an excise list in absolute seconds for the encoder.
//!
//! Invariant: keep windows plus cut windows tile `[0, duration]` exactly,
//! with no gaps and no overlaps.

use remig_common::time::{format_hms, parse_hms};
use remig_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One operator-supplied cut row, times as strict `HH:MM:SS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutInstruction {
    pub start_of_cut: String,
    pub end_of_cut: String,
    #[serde(default)]
    pub reason: String,
}

/// A retained window, in seconds from the start of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_secs: i64,
    pub end_secs: i64,
}

impl Segment {
    pub fn start_hms(&self) -> String {
        format_hms(self.start_secs)
    }

    pub fn end_hms(&self) -> String {
        format_hms(self.end_secs)
    }
}

/// The two parallel outputs of translation: keep windows for review and
/// excise windows for the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditInstructions {
    pub keep: Vec<Segment>,
    pub excise: Vec<Segment>,
}

/// Invert a cut list over a source of `duration_secs` into keep windows.
///
/// An empty cut list keeps the whole source. Cuts are sorted by start then
/// end before validation, so operator row order does not matter.
pub fn invert_cuts(cuts: &[CutInstruction], duration_secs: i64) -> Result<EditInstructions> {
    if duration_secs <= 0 {
        return Err(Error::InvalidInput(format!(
            "source duration must be positive, got {duration_secs}"
        )));
    }

    let mut parsed = Vec::with_capacity(cuts.len());
    for cut in cuts {
        let start = parse_hms(&cut.start_of_cut)?;
        let end = parse_hms(&cut.end_of_cut)?;
        parsed.push(Segment {
            start_secs: start,
            end_secs: end,
        });
    }

    if parsed.is_empty() {
        debug!("no cut instructions; keeping full source");
        return Ok(EditInstructions {
            keep: vec![Segment {
                start_secs: 0,
                end_secs: duration_secs,
            }],
            excise: Vec::new(),
        });
    }

    // A single cut spanning the whole source would leave nothing to keep.
    if parsed.len() == 1 && parsed[0].start_secs <= 0 && parsed[0].end_secs >= duration_secs {
        return Err(Error::InvalidInput(
            "cut instructions remove the entire recording".into(),
        ));
    }

    parsed.sort_by(|a, b| {
        a.start_secs
            .cmp(&b.start_secs)
            .then(a.end_secs.cmp(&b.end_secs))
    });

    for (i, cut) in parsed.iter().enumerate() {
        if cut.end_secs < cut.start_secs {
            return Err(Error::InvalidInput(format!(
                "cut {} ends before it starts ({} < {})",
                i,
                format_hms(cut.end_secs),
                format_hms(cut.start_secs)
            )));
        }
        if cut.end_secs == cut.start_secs {
            return Err(Error::InvalidInput(format!(
                "cut {} has zero length at {}",
                i,
                format_hms(cut.start_secs)
            )));
        }
        if cut.end_secs > duration_secs {
            return Err(Error::InvalidInput(format!(
                "cut {} ends at {} beyond the source duration {}",
                i,
                format_hms(cut.end_secs),
                format_hms(duration_secs)
            )));
        }
        if i > 0 && cut.start_secs < parsed[i - 1].end_secs {
            return Err(Error::InvalidInput(format!(
                "cut {} overlaps the previous cut at {}",
                i,
                format_hms(cut.start_secs)
            )));
        }
    }

    let mut keep = Vec::new();
    let mut current = 0i64;
    for cut in &parsed {
        if cut.start_secs > current {
            keep.push(Segment {
                start_secs: current,
                end_secs: cut.start_secs,
            });
        }
        current = cut.end_secs;
    }
    if current != duration_secs {
        keep.push(Segment {
            start_secs: current,
            end_secs: duration_secs,
        });
    }

    if keep.is_empty() {
        return Err(Error::InvalidInput(
            "cut instructions remove the entire recording".into(),
        ));
    }

    debug!(
        cuts = parsed.len(),
        keeps = keep.len(),
        "translated cut instructions"
    );
    Ok(EditInstructions {
        keep,
        excise: parsed,
    })
}
