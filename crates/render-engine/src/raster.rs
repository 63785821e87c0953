//! Caption rasterization onto RGB frames.
//!
//! Text is rasterized once into a coverage mask per caption and glyph size,
//! the stroke is that mask dilated by the stroke width, and both are alpha
//! blended onto the frame: stroke first, fill on top.
//!
//! One parsed font is scaled per requested size instead of being reloaded
//! for every zoom step. Rasterizing a new mask is still the per-frame cost
//! of zoom captions.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::RgbImage;
use rusttype::{point, Font, Scale};

use subburn_caption_model::{CaptionUnit, StyleConfig};
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_layout_core::{active_captions, appearance, text_origin, FrameSize, TextSize, ZoomTracker};

/// A parsed TrueType/OpenType font.
pub struct FontFace {
    font: Font<'static>,
    path: PathBuf,
}

impl FontFace {
    pub fn load(path: &Path) -> SubburnResult<Self> {
        let data = std::fs::read(path)
            .map_err(|e| SubburnError::font(path, format!("cannot read font file: {e}")))?;
        let font = Font::try_from_vec(data)
            .ok_or_else(|| SubburnError::font(path, "not a usable TrueType/OpenType font"))?;
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pixel scale whose em square is `size` pixels tall.
    fn scale_for(&self, size: u32) -> Scale {
        let units_per_em = f32::from(self.font.units_per_em().max(1));
        let v = self.font.v_metrics_unscaled();
        Scale::uniform(size as f32 * (v.ascent - v.descent) / units_per_em)
    }

    /// Rasterize a single line of text. Control characters are skipped.
    ///
    /// The pen box spans the advance width and the line height; the mask
    /// also covers ink outside it, such as negative bearings and accents
    /// above the ascent.
    pub fn rasterize(&self, text: &str, size: u32) -> TextMask {
        let line: String = text.chars().filter(|c| !c.is_control()).collect();
        let scale = self.scale_for(size);
        let v = self.font.v_metrics(scale);
        let positioned: Vec<_> = self.font.layout(&line, scale, point(0.0, v.ascent)).collect();

        let advance = positioned.last().map_or(0.0, |g| {
            g.position().x + g.unpositioned().h_metrics().advance_width
        });
        let pen = TextSize {
            width: advance.ceil().max(0.0) as u32,
            height: (v.ascent - v.descent).ceil().max(0.0) as u32,
        };

        let glyphs: Vec<_> = positioned
            .iter()
            .filter_map(|g| g.pixel_bounding_box().map(|bounds| (g, bounds)))
            .collect();
        let (mut min_x, mut min_y) = (0i32, 0i32);
        let (mut max_x, mut max_y) = (pen.width as i32, pen.height as i32);
        for (_, bounds) in &glyphs {
            min_x = min_x.min(bounds.min.x);
            min_y = min_y.min(bounds.min.y);
            max_x = max_x.max(bounds.max.x);
            max_y = max_y.max(bounds.max.y);
        }

        let mut mask = TextMask::empty((max_x - min_x) as u32, (max_y - min_y) as u32);
        mask.left = min_x;
        mask.top = min_y;
        mask.pen = pen;
        for (glyph, bounds) in &glyphs {
            glyph.draw(|gx, gy, coverage| {
                let x = i64::from(bounds.min.x - min_x) + i64::from(gx);
                let y = i64::from(bounds.min.y - min_y) + i64::from(gy);
                mask.accumulate(x, y, coverage);
            });
        }
        mask
    }
}

/// Per-pixel glyph coverage in `[0, 1]`.
///
/// Text is placed by its pen box; `(left, top)` is where the mask's first
/// pixel sits relative to the pen box's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMask {
    width: u32,
    height: u32,
    coverage: Vec<f32>,
    left: i32,
    top: i32,
    pen: TextSize,
}

impl TextMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: vec![0.0; width as usize * height as usize],
            left: 0,
            top: 0,
            pen: TextSize { width, height },
        }
    }

    /// Build a mask from row-major coverage values.
    pub fn from_coverage(width: u32, height: u32, coverage: Vec<f32>) -> SubburnResult<Self> {
        if coverage.len() != width as usize * height as usize {
            return Err(SubburnError::invalid_input(format!(
                "coverage has {} values, expected {}x{}",
                coverage.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            coverage,
            left: 0,
            top: 0,
            pen: TextSize { width, height },
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The pen box used for placement. Ink may extend past it.
    pub fn size(&self) -> TextSize {
        self.pen
    }

    /// Offset of the mask's top-left pixel from the pen box's top-left.
    pub fn offset(&self) -> (i32, i32) {
        (self.left, self.top)
    }

    pub fn at(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    fn accumulate(&mut self, x: i64, y: i64, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.coverage[idx] = (self.coverage[idx] + coverage).min(1.0);
    }

    /// Union of the mask stamped at every offset within `radius` on both axes.
    ///
    /// The result is `2 * radius` larger in each dimension and its offset
    /// moves out by `radius`; the pen box is unchanged.
    pub fn dilate(&self, radius: u32) -> TextMask {
        if radius == 0 {
            return self.clone();
        }
        let r = radius as usize;
        let (w, h) = (self.width as usize, self.height as usize);
        let (out_w, out_h) = (w + 2 * r, h + 2 * r);

        // separable square max filter: rows, then columns
        let mut rows = vec![0.0f32; out_w * h];
        for y in 0..h {
            let src = &self.coverage[y * w..(y + 1) * w];
            for ox in 0..out_w {
                let lo = ox.saturating_sub(2 * r);
                let hi = ox.min(w.saturating_sub(1));
                if w == 0 || lo > hi {
                    continue;
                }
                rows[y * out_w + ox] = src[lo..=hi].iter().copied().fold(0.0, f32::max);
            }
        }

        let mut out = vec![0.0f32; out_w * out_h];
        for ox in 0..out_w {
            for oy in 0..out_h {
                let lo = oy.saturating_sub(2 * r);
                let hi = oy.min(h.saturating_sub(1));
                if h == 0 || lo > hi {
                    continue;
                }
                out[oy * out_w + ox] = (lo..=hi)
                    .map(|y| rows[y * out_w + ox])
                    .fold(0.0, f32::max);
            }
        }

        TextMask {
            width: out_w as u32,
            height: out_h as u32,
            coverage: out,
            left: self.left - radius as i32,
            top: self.top - radius as i32,
            pen: self.pen,
        }
    }
}

/// Blend `color` through `mask` onto the frame with its top-left at
/// `(x0, y0)`. Pixels outside the frame are clipped.
pub fn blend_mask(
    frame: &mut RgbImage,
    mask: &TextMask,
    x0: i32,
    y0: i32,
    color: [u8; 3],
    opacity: f32,
) {
    if opacity <= 0.0 {
        return;
    }
    let (frame_w, frame_h) = (frame.width() as i64, frame.height() as i64);
    for my in 0..mask.height {
        let fy = y0 as i64 + my as i64;
        if fy < 0 || fy >= frame_h {
            continue;
        }
        for mx in 0..mask.width {
            let fx = x0 as i64 + mx as i64;
            if fx < 0 || fx >= frame_w {
                continue;
            }
            let a = (mask.at(mx, my) * opacity).clamp(0.0, 1.0);
            if a <= 0.0 {
                continue;
            }
            let pixel = frame.get_pixel_mut(fx as u32, fy as u32);
            for (channel, target) in pixel.0.iter_mut().zip(color) {
                let blended = *channel as f32 + (target as f32 - *channel as f32) * a;
                *channel = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

struct RenderedText {
    size: u32,
    fill: TextMask,
    stroke: Option<TextMask>,
}

/// Draws the captions active at a timestamp onto a frame.
///
/// Keeps the rasterized text of currently visible captions and the zoom
/// size history; everything else is per call.
pub struct CaptionPainter<'s> {
    style: &'s StyleConfig,
    face: FontFace,
    rendered: HashMap<usize, RenderedText>,
    zoom: ZoomTracker,
}

impl<'s> CaptionPainter<'s> {
    /// Load the style's font.
    pub fn new(style: &'s StyleConfig) -> SubburnResult<Self> {
        let face = FontFace::load(&style.font_path)?;
        Ok(Self::with_face(style, face))
    }

    pub fn with_face(style: &'s StyleConfig, face: FontFace) -> Self {
        Self {
            style,
            face,
            rendered: HashMap::new(),
            zoom: ZoomTracker::new(),
        }
    }

    /// Paint every caption active at `t`, in alignment order. Returns how
    /// many captions were drawn.
    pub fn paint(&mut self, frame: &mut RgbImage, alignment: &[CaptionUnit], t: f64) -> usize {
        let style = self.style;
        let frame_size = FrameSize {
            width: frame.width(),
            height: frame.height(),
        };
        let active = active_captions(alignment, t);
        let mut drawn = 0;

        for &(index, unit) in &active {
            let look = appearance(unit, t, style);
            let size = self.zoom.resolve(index, look.glyph);

            let needs_raster = self
                .rendered
                .get(&index)
                .map_or(true, |cached| cached.size != size);
            if needs_raster {
                let fill = self.face.rasterize(&unit.text, size);
                let stroke = (style.stroke_width > 0).then(|| fill.dilate(style.stroke_width));
                self.rendered.insert(index, RenderedText { size, fill, stroke });
            }
            let Some(text) = self.rendered.get(&index) else {
                continue;
            };

            let (x, y) = text_origin(text.fill.size(), style, frame_size, look.progress);
            let opacity = look.alpha as f32;
            if let Some(stroke) = &text.stroke {
                let (dx, dy) = stroke.offset();
                blend_mask(frame, stroke, x + dx, y + dy, style.stroke_color.rgb(), opacity);
            }
            let (dx, dy) = text.fill.offset();
            blend_mask(frame, &text.fill, x + dx, y + dy, style.font_color.rgb(), opacity);
            drawn += 1;
        }

        let visible: HashSet<usize> = active.iter().map(|(index, _)| *index).collect();
        self.rendered.retain(|index, _| visible.contains(index));
        drawn
    }
}

/// Well-known font locations, used by tests that need a real font.
pub fn find_system_font() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];
    CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use subburn_caption_model::{AnimationKind, Color};

    fn dot() -> TextMask {
        TextMask::from_coverage(1, 1, vec![1.0]).unwrap()
    }

    #[test]
    fn test_dilate_square() {
        let stroke = dot().dilate(2);
        assert_eq!((stroke.width(), stroke.height()), (5, 5));
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(stroke.at(x, y), 1.0);
            }
        }
    }

    #[test]
    fn test_dilate_keeps_gaps_beyond_radius() {
        let mask = TextMask::from_coverage(5, 1, vec![1.0, 0.0, 0.0, 0.0, 0.5]).unwrap();
        let stroke = mask.dilate(1);
        assert_eq!((stroke.width(), stroke.height()), (7, 3));
        let row: Vec<f32> = (0..7).map(|x| stroke.at(x, 1)).collect();
        assert_eq!(row, vec![1.0, 1.0, 1.0, 0.0, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_dilate_moves_offset_and_keeps_pen_box() {
        let mask = TextMask::from_coverage(3, 2, vec![1.0; 6]).unwrap();
        let stroke = mask.dilate(2);
        assert_eq!(stroke.offset(), (-2, -2));
        assert_eq!(stroke.size(), mask.size());
        assert_eq!(mask.offset(), (0, 0));
    }

    #[test]
    fn test_rasterize_keeps_ink_outside_pen_box() {
        let Some(font) = find_system_font() else {
            eprintln!("skipping: no system font found");
            return;
        };
        let face = FontFace::load(&font).unwrap();
        let scale = face.scale_for(64);
        let v = face.font.v_metrics(scale);

        // single glyphs, so no pixel is covered twice
        for text in ["j", "\u{c5}", "f", "y"] {
            let mut expected = 0.0f64;
            for glyph in face.font.layout(text, scale, point(0.0, v.ascent)) {
                glyph.draw(|_, _, c| expected += f64::from(c));
            }
            let mask = face.rasterize(text, 64);
            let mut drawn = 0.0f64;
            for y in 0..mask.height() {
                for x in 0..mask.width() {
                    drawn += f64::from(mask.at(x, y));
                }
            }
            assert!(expected > 0.0, "{text} has no ink");
            assert!(
                (drawn - expected).abs() < 1e-3,
                "{text}: drew {drawn}, glyph has {expected}"
            );
            let (left, top) = mask.offset();
            assert!(left <= 0 && top <= 0);
            assert!(mask.width() as i32 + left >= mask.size().width as i32);
        }
    }

    #[test]
    fn test_from_coverage_checks_length() {
        assert!(TextMask::from_coverage(2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_blend_clips_and_mixes() {
        let mut frame = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let mask = TextMask::from_coverage(2, 2, vec![1.0, 0.5, 0.0, 1.0]).unwrap();
        blend_mask(&mut frame, &mask, 3, -1, [200, 100, 50], 1.0);
        // only mask (0,1) lands inside, at frame (3,0); mask (1,1) is off the right edge
        assert_eq!(frame.get_pixel(3, 0).0, [0, 0, 0]);
        blend_mask(&mut frame, &mask, 0, 0, [200, 100, 50], 1.0);
        assert_eq!(frame.get_pixel(0, 0).0, [200, 100, 50]);
        assert_eq!(frame.get_pixel(1, 0).0, [100, 50, 25]);
        assert_eq!(frame.get_pixel(0, 1).0, [0, 0, 0]);
    }

    #[test]
    fn test_blend_respects_opacity() {
        let mut frame = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        blend_mask(&mut frame, &dot(), 0, 0, [255, 255, 255], 0.5);
        assert_eq!(frame.get_pixel(0, 0).0, [128, 128, 128]);
        blend_mask(&mut frame, &dot(), 0, 0, [0, 0, 0], 0.0);
        assert_eq!(frame.get_pixel(0, 0).0, [128, 128, 128]);
    }

    #[test]
    fn test_missing_font_is_font_error() {
        let err = FontFace::load(Path::new("/nonexistent/font.ttf")).err().unwrap();
        assert!(matches!(err, SubburnError::FontResolution { .. }));

        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"definitely not a font").unwrap();
        let err = FontFace::load(&bogus).err().unwrap();
        assert!(matches!(err, SubburnError::FontResolution { .. }));
    }

    #[test]
    fn test_painter_draws_only_active_captions() {
        let Some(font) = find_system_font() else {
            eprintln!("skipping: no system font found");
            return;
        };
        let style = StyleConfig::new("system", font)
            .with_font_size(24)
            .with_font_color(Color::white())
            .with_stroke(2, Color::black())
            .with_position(subburn_caption_model::PositionPreset::Center, 0, 0);
        let mut painter = CaptionPainter::new(&style).unwrap();
        let alignment = vec![CaptionUnit::new(0.5, 2.0, "Hello World")];

        let background = Rgb([40, 80, 120]);
        let mut frame = RgbImage::from_pixel(320, 120, background);
        assert_eq!(painter.paint(&mut frame, &alignment, 0.25), 0);
        assert!(frame.pixels().all(|p| *p == background));

        assert_eq!(painter.paint(&mut frame, &alignment, 1.0), 1);
        assert!(frame.pixels().any(|p| p.0 == [255, 255, 255]));
        assert!(frame.pixels().any(|p| p.0 == [0, 0, 0]));
        // corners stay untouched for a centered caption
        assert_eq!(*frame.get_pixel(0, 0), background);
    }

    #[test]
    fn test_zoom_rasterizes_per_size() {
        let Some(font) = find_system_font() else {
            eprintln!("skipping: no system font found");
            return;
        };
        let face = FontFace::load(&font).unwrap();
        let small = face.rasterize("Zoom", 12);
        let large = face.rasterize("Zoom", 48);
        assert!(large.width() > small.width());
        assert!(large.height() > small.height());

        let style = StyleConfig::new("system", font)
            .with_font_size(48)
            .with_animation(AnimationKind::Zoom, 0.5);
        let mut painter = CaptionPainter::with_face(&style, face);
        let alignment = vec![CaptionUnit::new(0.0, 2.0, "Zoom")];
        let mut frame = RgbImage::new(200, 200);
        // progress 0: below legible, held at the minimum size
        assert_eq!(painter.paint(&mut frame, &alignment, 0.0), 1);
        assert_eq!(painter.paint(&mut frame, &alignment, 0.25), 1);
    }
}
