//! Subburn Layout Core
//!
//! Pure caption animation and placement math, consumed by both the
//! filtergraph and the frame-painting backends:
//! - **Activation:** which captions are visible at a timestamp
//! - **Animation:** intro progress, fade opacity, zoom glyph size
//! - **Position:** preset anchoring plus the slide offset
//!
//! No I/O and no rendering dependencies. All inputs are data; all outputs
//! are data.

pub mod animation;
pub mod position;

pub use animation::{
    active_captions, alpha, animation_progress, appearance, effective_glyph_size, Appearance,
    GlyphSize, ZoomTracker, MIN_LEGIBLE_SIZE,
};
pub use position::{text_origin, FrameSize, TextSize, SLIDE_DISTANCE};
