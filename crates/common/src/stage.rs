//! Render pipeline stages.
//!
//! One render invocation walks
//! `Validating -> Probing -> Streaming/Filtering -> Encoding -> Remuxing -> Complete`.
//! A failed audio remux does not move to `Failed`; it falls through to
//! `Complete` with a degraded result.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of a single render invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    /// Checking the request before any media is touched.
    Validating,
    /// Reading stream metadata from the source.
    Probing,
    /// Single-pass filtergraph encode.
    Filtering,
    /// Decode, draw, and encode loop, one frame at a time.
    Streaming,
    /// Finalizing the silent intermediate encode.
    Encoding,
    /// Reattaching the source audio track.
    Remuxing,
    Complete,
    Failed,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStage::Validating => "validating",
            RenderStage::Probing => "probing",
            RenderStage::Filtering => "filtering",
            RenderStage::Streaming => "streaming",
            RenderStage::Encoding => "encoding",
            RenderStage::Remuxing => "remuxing",
            RenderStage::Complete => "complete",
            RenderStage::Failed => "failed",
        }
    }

    /// Whether the stage ends the invocation.
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderStage::Complete | RenderStage::Failed)
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_matches_serde_name() {
        let json = serde_json::to_string(&RenderStage::Remuxing).unwrap();
        assert_eq!(json, format!("\"{}\"", RenderStage::Remuxing));
    }

    #[test]
    fn test_terminal_stages() {
        assert!(RenderStage::Complete.is_terminal());
        assert!(RenderStage::Failed.is_terminal());
        assert!(!RenderStage::Remuxing.is_terminal());
    }
}
