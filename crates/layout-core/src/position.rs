//! Caption placement on the frame.

use subburn_caption_model::{AnimationKind, PositionPreset, StyleConfig};

/// Vertical travel of the slide animations, in pixels.
pub const SLIDE_DISTANCE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Measured bounds of the rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextSize {
    pub width: u32,
    pub height: u32,
}

/// Top-left corner of the caption text.
///
/// The result may fall partly or wholly outside the frame; painting clips.
pub fn text_origin(text: TextSize, style: &StyleConfig, frame: FrameSize, progress: f64) -> (i32, i32) {
    let frame_w = frame.width as i32;
    let frame_h = frame.height as i32;
    let centered_x = (frame_w - text.width as i32).div_euclid(2);

    let (x, mut y) = match style.position {
        PositionPreset::BottomCenter => (centered_x, frame_h - style.y_position),
        PositionPreset::TopCenter => (centered_x, style.y_position),
        PositionPreset::Center => (centered_x, (frame_h - text.height as i32).div_euclid(2)),
        PositionPreset::Custom => (style.x_position, style.y_position),
    };

    if progress < 1.0 {
        let offset = (SLIDE_DISTANCE * (1.0 - progress.max(0.0))) as i32;
        match style.animation {
            AnimationKind::SlideUp => y += offset,
            AnimationKind::SlideDown => y -= offset,
            _ => {}
        }
    }

    (x, y)
}
