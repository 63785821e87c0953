//! In-memory "canvas" rendering.
//!
//! Lite mode holds every frame of the clip at once, which is fine for short
//! clips and lets callers that already own decoded frames paint them
//! directly with [`paint_frames`].

use std::sync::Arc;

use image::RgbImage;

use subburn_caption_model::{CaptionUnit, RenderRequest, RenderResult, StyleConfig};
use subburn_common::clock::FrameClock;
use subburn_common::config::ToolConfig;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;

use crate::media::{bgr_to_rgb, ChannelOrder, MediaEngine};
use crate::raster::CaptionPainter;
use crate::remux::reattach_audio;
use crate::renderer::{report, ProgressCallback, RenderProgress, SubtitleRenderer};
use crate::streaming::{check_dimensions, silent_scratch};

/// Paint captions onto a sequence of frames, where frame `i` is shown at
/// `i / fps`. Returns how many frames received at least one caption.
pub fn paint_frames(
    frames: &mut [RgbImage],
    alignment: &[CaptionUnit],
    style: &StyleConfig,
    fps: f64,
) -> SubburnResult<usize> {
    let mut painter = CaptionPainter::new(style)?;
    paint_frames_with(&mut painter, frames, alignment, fps)
}

/// [`paint_frames`] with a painter whose font is already loaded.
pub fn paint_frames_with(
    painter: &mut CaptionPainter<'_>,
    frames: &mut [RgbImage],
    alignment: &[CaptionUnit],
    fps: f64,
) -> SubburnResult<usize> {
    let clock = FrameClock::new(fps)?;
    let mut captioned = 0;
    for (index, frame) in frames.iter_mut().enumerate() {
        if painter.paint(frame, alignment, clock.time_at(index as u64)) > 0 {
            captioned += 1;
        }
    }
    Ok(captioned)
}

/// Decodes the whole clip, paints it in memory, then encodes it.
pub struct LiteRenderer {
    engine: Arc<dyn MediaEngine>,
    tools: ToolConfig,
}

impl LiteRenderer {
    pub fn new(engine: Arc<dyn MediaEngine>, tools: ToolConfig) -> Self {
        Self { engine, tools }
    }
}

impl SubtitleRenderer for LiteRenderer {
    fn name(&self) -> &str {
        "lite"
    }

    fn render(
        &self,
        request: &RenderRequest,
        progress: Option<ProgressCallback>,
    ) -> SubburnResult<RenderResult> {
        self.validate(request)?;
        let mut painter = CaptionPainter::new(&request.style)?;

        let info = self.engine.probe(&request.video_path)?;
        check_dimensions(&info)?;
        let total = info.estimated_frames(request.fps);

        let mut decoder = self.engine.open_decoder(&request.video_path, &info)?;
        let swap_channels = decoder.channel_order() == ChannelOrder::Bgr;
        let mut frames = Vec::with_capacity(total as usize);
        let mut frame = RgbImage::new(info.width, info.height);
        while decoder.next_frame(&mut frame)? {
            if swap_channels {
                bgr_to_rgb(&mut frame);
            }
            frames.push(frame.clone());
        }
        drop(decoder);
        if frames.is_empty() {
            return Err(SubburnError::render(
                RenderStage::Streaming,
                format!("no frames decoded from {}", request.video_path.display()),
            ));
        }
        let count = frames.len() as u64;
        tracing::info!(frames = count, renderer = self.name(), "Decoded clip into memory");
        report(&progress, RenderProgress::at(RenderStage::Streaming, 0, count));

        let captioned =
            paint_frames_with(&mut painter, &mut frames, &request.alignment, request.fps)?;
        tracing::debug!(captioned, "Captions painted");

        let scratch = silent_scratch(&request.output_path)?;
        let mut encoder =
            self.engine
                .open_encoder(scratch.path(), info.width, info.height, request.fps)?;
        for frame in &frames {
            encoder.write_frame(frame)?;
        }
        encoder.finish()?;
        drop(frames);

        report(&progress, RenderProgress::at(RenderStage::Remuxing, count, count));
        let audio = reattach_audio(
            self.engine.as_ref(),
            &self.tools,
            scratch.path(),
            &request.video_path,
            info.has_audio,
            &request.output_path,
        )?;

        report(&progress, RenderProgress::complete(count));
        Ok(
            RenderResult::success(self.name(), &request.output_path, request.alignment.len())
                .with_frames(count)
                .with_audio(audio),
        )
    }

    fn is_available(&self) -> bool {
        self.engine.is_available()
    }
}
