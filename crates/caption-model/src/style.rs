//! Caption style configuration.
//!
//! A [`StyleConfig`] is built once per render call and only borrowed by
//! renderers afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use subburn_common::error::{SubburnError, SubburnResult};

use crate::color::Color;

pub const MIN_FONT_SIZE: u32 = 10;
pub const MAX_FONT_SIZE: u32 = 500;
pub const MAX_STROKE_WIDTH: u32 = 20;
pub const MIN_ANIMATION_DURATION: f64 = 0.1;
pub const MAX_ANIMATION_DURATION: f64 = 2.0;

/// Caption intro/outro animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    #[default]
    None,
    /// Opacity ramps in after `start` and out before `end`.
    Fade,
    /// Caption rises 50px into place.
    SlideUp,
    /// Caption falls 50px into place.
    SlideDown,
    /// Glyphs grow from nothing to the configured size.
    Zoom,
}

impl AnimationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationKind::None => "none",
            AnimationKind::Fade => "fade",
            AnimationKind::SlideUp => "slide_up",
            AnimationKind::SlideDown => "slide_down",
            AnimationKind::Zoom => "zoom",
        }
    }
}

impl fmt::Display for AnimationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimationKind {
    type Err = SubburnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(AnimationKind::None),
            "fade" => Ok(AnimationKind::Fade),
            "slide_up" => Ok(AnimationKind::SlideUp),
            "slide_down" => Ok(AnimationKind::SlideDown),
            "zoom" => Ok(AnimationKind::Zoom),
            other => Err(SubburnError::invalid_input(format!(
                "Unknown animation: {other}. Use: none, fade, slide_up, slide_down, zoom"
            ))),
        }
    }
}

/// Where a caption is anchored on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionPreset {
    /// Centered horizontally, `y_position` px above the bottom edge.
    #[default]
    BottomCenter,
    /// Centered horizontally, `y_position` px below the top edge.
    TopCenter,
    /// Centered on both axes.
    Center,
    /// Top-left corner at (`x_position`, `y_position`).
    Custom,
}

impl PositionPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionPreset::BottomCenter => "bottom_center",
            PositionPreset::TopCenter => "top_center",
            PositionPreset::Center => "center",
            PositionPreset::Custom => "custom",
        }
    }
}

impl fmt::Display for PositionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionPreset {
    type Err = SubburnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bottom_center" => Ok(PositionPreset::BottomCenter),
            "top_center" => Ok(PositionPreset::TopCenter),
            "center" => Ok(PositionPreset::Center),
            "custom" => Ok(PositionPreset::Custom),
            other => Err(SubburnError::invalid_input(format!(
                "Unknown position: {other}. Use: bottom_center, top_center, center, custom"
            ))),
        }
    }
}

/// Font, color, stroke, animation and placement for one render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Font identifier as chosen by the caller (usually the file name).
    pub font_family: String,

    /// Resolved font file.
    pub font_path: PathBuf,

    /// Point size, 10..=500.
    pub font_size: u32,

    pub font_color: Color,

    /// Outline width in pixels, 0 disables the outline.
    pub stroke_width: u32,

    pub stroke_color: Color,

    pub animation: AnimationKind,

    /// Intro/outro length in seconds, 0.1..=2.0.
    pub animation_duration: f64,

    pub position: PositionPreset,

    /// Only used by [`PositionPreset::Custom`].
    pub x_position: i32,

    /// Edge offset for the centered presets, top offset for custom.
    pub y_position: i32,
}

impl StyleConfig {
    /// A style with the stock defaults for the given font.
    pub fn new(font_family: impl Into<String>, font_path: impl Into<PathBuf>) -> Self {
        Self {
            font_family: font_family.into(),
            font_path: font_path.into(),
            font_size: 100,
            font_color: Color::white(),
            stroke_width: 3,
            stroke_color: Color::black(),
            animation: AnimationKind::None,
            animation_duration: 0.3,
            position: PositionPreset::BottomCenter,
            x_position: 0,
            y_position: 100,
        }
    }

    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_font_color(mut self, color: Color) -> Self {
        self.font_color = color;
        self
    }

    pub fn with_stroke(mut self, width: u32, color: Color) -> Self {
        self.stroke_width = width;
        self.stroke_color = color;
        self
    }

    pub fn with_animation(mut self, kind: AnimationKind, duration: f64) -> Self {
        self.animation = kind;
        self.animation_duration = duration;
        self
    }

    pub fn with_position(mut self, preset: PositionPreset, x: i32, y: i32) -> Self {
        self.position = preset;
        self.x_position = x;
        self.y_position = y;
        self
    }

    /// Check every numeric field against its allowed range.
    pub fn validate(&self) -> SubburnResult<()> {
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.font_size) {
            return Err(SubburnError::invalid_input(format!(
                "font_size must be between {MIN_FONT_SIZE} and {MAX_FONT_SIZE}, got {}",
                self.font_size
            )));
        }
        if self.stroke_width > MAX_STROKE_WIDTH {
            return Err(SubburnError::invalid_input(format!(
                "stroke_width must be at most {MAX_STROKE_WIDTH}, got {}",
                self.stroke_width
            )));
        }
        let d = self.animation_duration;
        if !d.is_finite() || !(MIN_ANIMATION_DURATION..=MAX_ANIMATION_DURATION).contains(&d) {
            return Err(SubburnError::invalid_input(format!(
                "animation_duration must be between {MIN_ANIMATION_DURATION} and {MAX_ANIMATION_DURATION} seconds, got {d}"
            )));
        }
        if self.font_path.as_os_str().is_empty() {
            return Err(SubburnError::invalid_input("font_path is empty"));
        }
        Ok(())
    }
}
