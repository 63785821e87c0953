//! Caption alignment types.
//!
//! An alignment is the ordered list of caption units a transcription
//! collaborator produces for one video, serialized as a JSON array of
//! `{"start": f64, "end": f64, "value": string}` objects. Ordering by `start`
//! is expected but not enforced: unsorted and overlapping units are kept as-is.

use std::path::Path;

use serde::{Deserialize, Serialize};

use subburn_common::error::{SubburnError, SubburnResult};

/// One timed span of on-screen text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionUnit {
    /// Start time in seconds (>= 0).
    pub start: f64,

    /// End time in seconds (>= start).
    pub end: f64,

    /// Caption text.
    #[serde(rename = "value", alias = "text")]
    pub text: String,
}

impl CaptionUnit {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Length of the span in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the unit is visible at `t` (inclusive at both ends).
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    /// Check timing sanity. `index` is used in the error message only.
    pub fn validate(&self, index: usize) -> SubburnResult<()> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(SubburnError::invalid_input(format!(
                "Caption {index} has non-finite timing ({} -> {})",
                self.start, self.end
            )));
        }
        if self.start < 0.0 {
            return Err(SubburnError::invalid_input(format!(
                "Caption {index} starts before zero ({})",
                self.start
            )));
        }
        if self.end < self.start {
            return Err(SubburnError::invalid_input(format!(
                "Caption {index} ends before it starts ({} -> {})",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Parse an alignment from its JSON array form and validate every unit.
pub fn parse_alignment(json: &str) -> SubburnResult<Vec<CaptionUnit>> {
    let units: Vec<CaptionUnit> = serde_json::from_str(json)
        .map_err(|e| SubburnError::invalid_input(format!("Malformed alignment JSON: {e}")))?;
    for (index, unit) in units.iter().enumerate() {
        unit.validate(index)?;
    }
    if !is_sorted_by_start(&units) {
        tracing::debug!(units = units.len(), "Alignment is not sorted by start time");
    }
    Ok(units)
}

/// Read and parse an alignment file.
pub fn load_alignment(path: &Path) -> SubburnResult<Vec<CaptionUnit>> {
    if !path.exists() {
        return Err(SubburnError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_alignment(&content)
}

/// Serialize an alignment back to its JSON array form.
pub fn serialize_alignment(units: &[CaptionUnit]) -> SubburnResult<String> {
    Ok(serde_json::to_string_pretty(units)?)
}

/// Whether units are in non-decreasing `start` order.
pub fn is_sorted_by_start(units: &[CaptionUnit]) -> bool {
    units.windows(2).all(|pair| pair[0].start <= pair[1].start)
}

/// Latest end time across all units, 0 when empty.
pub fn alignment_end(units: &[CaptionUnit]) -> f64 {
    units.iter().map(|u| u.end).fold(0.0, f64::max)
}
