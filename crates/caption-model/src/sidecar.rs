//! SRT and WebVTT export of an alignment.

use std::path::Path;

use subburn_common::error::SubburnResult;

use crate::caption::CaptionUnit;

/// Render units as SRT, numbered from 1.
pub fn generate_srt(units: &[CaptionUnit]) -> String {
    let mut output = String::new();

    for (i, unit) in units.iter().enumerate() {
        output.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            timestamp(unit.start, ','),
            timestamp(unit.end, ','),
            unit.text
        ));
    }

    output
}

/// Render units as WebVTT.
pub fn generate_vtt(units: &[CaptionUnit]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for unit in units {
        output.push_str(&format!(
            "{} --> {}\n{}\n\n",
            timestamp(unit.start, '.'),
            timestamp(unit.end, '.'),
            unit.text
        ));
    }

    output
}

/// `HH:MM:SS<sep>mmm`, rounded to the nearest millisecond.
fn timestamp(secs: f64, millis_sep: char) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}{millis_sep}{millis:03}")
}

/// Write a sidecar file; `.vtt` selects WebVTT, anything else SRT.
pub fn save_sidecar(units: &[CaptionUnit], path: &Path) -> SubburnResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("vtt") => generate_vtt(units),
        _ => generate_srt(units),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), captions = units.len(), "Sidecar subtitles written");
    Ok(())
}
