//! Frame-at-a-time renderer.
//!
//! Decode one frame, paint the active captions, encode it, reuse the buffer.
//! Memory is one frame plus the rasterized text of the visible captions,
//! independent of video length. The encoded stream has no audio; it goes to
//! a scratch file next to the output and the source audio is reattached at
//! the end.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use tempfile::NamedTempFile;

use subburn_caption_model::{RenderRequest, RenderResult};
use subburn_common::clock::{FrameClock, ProgressTicker};
use subburn_common::config::ToolConfig;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;

use crate::media::{bgr_to_rgb, ChannelOrder, FrameSink, FrameSource, MediaEngine, MediaInfo};
use crate::raster::CaptionPainter;
use crate::remux::reattach_audio;
use crate::renderer::{report, ProgressCallback, RenderProgress, SubtitleRenderer};

/// Renders captions by painting decoded frames one at a time.
pub struct StreamingRenderer {
    engine: Arc<dyn MediaEngine>,
    tools: ToolConfig,
    progress_interval: u64,
}

impl StreamingRenderer {
    pub fn new(engine: Arc<dyn MediaEngine>, progress_interval: u64) -> Self {
        Self::with_tools(engine, ToolConfig::default(), progress_interval)
    }

    pub fn with_tools(engine: Arc<dyn MediaEngine>, tools: ToolConfig, progress_interval: u64) -> Self {
        Self {
            engine,
            tools,
            progress_interval,
        }
    }
}

/// Scratch file for the silent encode, in the output's directory so the
/// final copy stays on one filesystem. Deleted on drop.
pub(crate) fn silent_scratch(output: &Path) -> SubburnResult<NamedTempFile> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = output
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".mp4".to_string());
    tempfile::Builder::new()
        .prefix(".subburn-silent-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| {
            SubburnError::render(
                RenderStage::Encoding,
                format!("failed to create scratch file in {}: {e}", dir.display()),
            )
        })
}

pub(crate) fn check_dimensions(info: &MediaInfo) -> SubburnResult<()> {
    if info.width == 0 || info.height == 0 {
        return Err(SubburnError::render(
            RenderStage::Probing,
            format!("source has invalid dimensions {}x{}", info.width, info.height),
        ));
    }
    Ok(())
}

/// The decode → paint → encode loop. Returns the number of frames written.
fn stream_frames(
    decoder: &mut dyn FrameSource,
    encoder: &mut dyn FrameSink,
    painter: &mut CaptionPainter<'_>,
    request: &RenderRequest,
    info: &MediaInfo,
    progress_interval: u64,
    progress: &Option<ProgressCallback>,
) -> SubburnResult<u64> {
    let clock = FrameClock::new(request.fps)?;
    let total_frames = info.estimated_frames(clock.fps());
    let mut ticker = ProgressTicker::new(progress_interval);
    let mut frame = RgbImage::new(info.width, info.height);
    let swap_channels = decoder.channel_order() == ChannelOrder::Bgr;

    let mut frames_done = 0u64;
    while decoder.next_frame(&mut frame)? {
        if swap_channels {
            bgr_to_rgb(&mut frame);
        }
        let t = clock.time_at(frames_done);
        painter.paint(&mut frame, &request.alignment, t);
        encoder.write_frame(&frame)?;
        frames_done += 1;

        if ticker.should_tick(frames_done) {
            tracing::info!(frames = frames_done, total_frames, "Streaming render progress");
            report(
                progress,
                RenderProgress::at(RenderStage::Streaming, frames_done, total_frames),
            );
        }
    }
    Ok(frames_done)
}

impl SubtitleRenderer for StreamingRenderer {
    fn name(&self) -> &str {
        "pillow"
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
        report(
            &progress,
            RenderProgress::at(RenderStage::Streaming, 0, info.estimated_frames(request.fps)),
        );
        tracing::info!(
            renderer = self.name(),
            width = info.width,
            height = info.height,
            captions = request.alignment.len(),
            "Starting streaming render"
        );

        let scratch = silent_scratch(&request.output_path)?;
        let mut decoder = self.engine.open_decoder(&request.video_path, &info)?;
        let mut encoder =
            self.engine
                .open_encoder(scratch.path(), info.width, info.height, request.fps)?;

        let frames = stream_frames(
            decoder.as_mut(),
            encoder.as_mut(),
            &mut painter,
            request,
            &info,
            self.progress_interval,
            &progress,
        )?;
        drop(decoder);
        encoder.finish()?;
        if frames == 0 {
            return Err(SubburnError::render(
                RenderStage::Streaming,
                format!("no frames decoded from {}", request.video_path.display()),
            ));
        }

        report(&progress, RenderProgress::at(RenderStage::Remuxing, frames, frames));
        let audio = reattach_audio(
            self.engine.as_ref(),
            &self.tools,
            scratch.path(),
            &request.video_path,
            info.has_audio,
            &request.output_path,
        )?;

        tracing::info!(frames, output = %request.output_path.display(), "Streaming render finished");
        report(&progress, RenderProgress::complete(frames));
        Ok(
            RenderResult::success(self.name(), &request.output_path, request.alignment.len())
                .with_frames(frames)
                .with_audio(audio),
        )
    }

    fn is_available(&self) -> bool {
        self.engine.is_available()
    }
}
