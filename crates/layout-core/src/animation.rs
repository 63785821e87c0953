//! Caption activation and animation curves.

use std::collections::HashMap;

use subburn_caption_model::{AnimationKind, CaptionUnit, StyleConfig};

/// Smallest glyph size a zoom animation will draw.
pub const MIN_LEGIBLE_SIZE: u32 = 10;

/// Captions visible at `t`, with their index in the alignment.
///
/// Both ends are inclusive, so zero-duration and overlapping units can be
/// active together. Order follows the alignment; later units draw on top.
pub fn active_captions(alignment: &[CaptionUnit], t: f64) -> Vec<(usize, &CaptionUnit)> {
    alignment
        .iter()
        .enumerate()
        .filter(|(_, unit)| unit.contains(t))
        .collect()
}

/// Intro progress in `[0, 1]`: `(t - start) / duration`, clamped.
pub fn animation_progress(unit: &CaptionUnit, t: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 1.0;
    }
    ((t - unit.start) / duration).clamp(0.0, 1.0)
}

/// Caption opacity at `t`.
///
/// Only `fade` animates opacity: a ramp up over the first `duration` seconds
/// and a ramp down over the last. When the caption is shorter than two ramps
/// the ramp-up branch wins, so the value can jump where the ramps meet.
pub fn alpha(unit: &CaptionUnit, t: f64, style: &StyleConfig) -> f64 {
    if style.animation != AnimationKind::Fade {
        return 1.0;
    }
    let d = style.animation_duration;
    if d <= 0.0 {
        return 1.0;
    }

    let value = if t - unit.start < d {
        (t - unit.start) / d
    } else if unit.end - t < d {
        (unit.end - t) / d
    } else {
        1.0
    };
    value.clamp(0.0, 1.0)
}

/// Glyph size for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphSize {
    Sized(u32),
    /// Zoom is still too small to read; hold the previous size.
    BelowLegible,
}

/// Font size to draw at a given intro progress.
///
/// Non-zoom styles always use the configured size. Zoom scales it by
/// `progress`, truncating to whole points.
pub fn effective_glyph_size(progress: f64, style: &StyleConfig) -> GlyphSize {
    if style.animation != AnimationKind::Zoom {
        return GlyphSize::Sized(style.font_size);
    }
    let size = (style.font_size as f64 * progress.clamp(0.0, 1.0)) as u32;
    if size < MIN_LEGIBLE_SIZE {
        GlyphSize::BelowLegible
    } else {
        GlyphSize::Sized(size)
    }
}

/// Remembers the last drawn zoom size per caption so sub-legible frames can
/// repeat it.
#[derive(Debug, Default)]
pub struct ZoomTracker {
    last: HashMap<usize, u32>,
}

impl ZoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size to draw caption `index` at. A caption with no previous size
    /// starts at [`MIN_LEGIBLE_SIZE`].
    pub fn resolve(&mut self, index: usize, size: GlyphSize) -> u32 {
        match size {
            GlyphSize::Sized(px) => {
                self.last.insert(index, px);
                px
            }
            GlyphSize::BelowLegible => *self.last.get(&index).unwrap_or(&MIN_LEGIBLE_SIZE),
        }
    }
}

/// Everything a backend needs to draw one caption on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub progress: f64,
    pub alpha: f64,
    pub glyph: GlyphSize,
}

pub fn appearance(unit: &CaptionUnit, t: f64, style: &StyleConfig) -> Appearance {
    let progress = animation_progress(unit, t, style.animation_duration);
    Appearance {
        progress,
        alpha: alpha(unit, t, style),
        glyph: effective_glyph_size(progress, style),
    }
}
