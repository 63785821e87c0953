//! The external codec/filter engine boundary.
//!
//! Renderers never spawn processes directly. They talk to a [`MediaEngine`],
//! which probes sources, runs one-shot tool invocations, and hands out
//! frame-at-a-time decoders and encoders. [`crate::ffmpeg::FfmpegEngine`] is
//! the production implementation; tests substitute an in-memory engine.

use std::ffi::OsString;
use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use subburn_common::error::SubburnResult;
use subburn_common::stage::RenderStage;

/// Stream facts needed to plan a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    /// Container-reported frame count, when known.
    pub frame_count: Option<u64>,
    /// Average frame rate of the video stream, when known.
    pub frame_rate: Option<f64>,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Best estimate of the number of frames at `fps`.
    pub fn estimated_frames(&self, fps: f64) -> u64 {
        self.frame_count
            .unwrap_or_else(|| (self.duration_secs.max(0.0) * fps).round() as u64)
    }
}

/// Progress fields reported by a running tool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToolProgress {
    /// Media time written so far.
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ToolProgress {
    /// Fold one `key=value` line of ffmpeg `-progress` output into the state.
    /// Returns true when the line closes a progress block.
    pub fn update(&mut self, key: &str, value: &str) -> bool {
        match key {
            // ffmpeg reports microseconds under both names
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
                false
            }
            "progress" => {
                self.complete = value.trim() == "end";
                true
            }
            _ => false,
        }
    }
}

/// Captured output of a tool that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed_secs: f64,
}

/// Byte order of the pixels a decoder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// A decoder yielding one frame at a time, in presentation order.
pub trait FrameSource: Send {
    /// Channel order of the frames written by [`FrameSource::next_frame`].
    fn channel_order(&self) -> ChannelOrder;

    /// Overwrite `frame` with the next frame. Returns `false` at end of stream.
    fn next_frame(&mut self, frame: &mut RgbImage) -> SubburnResult<bool>;
}

/// An encoder accepting RGB frames one at a time.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> SubburnResult<()>;

    /// Close the input and wait for the encoded file to be complete.
    fn finish(self: Box<Self>) -> SubburnResult<()>;
}

pub type ToolProgressFn<'a> = &'a dyn Fn(&ToolProgress);

/// Narrow interface over the external video toolchain.
pub trait MediaEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Whether the underlying tools can be executed.
    fn is_available(&self) -> bool;

    fn probe(&self, path: &Path) -> SubburnResult<MediaInfo>;

    /// Run one tool invocation to completion.
    ///
    /// A non-zero exit or a timeout is a `RenderFailure` tagged with `stage`
    /// and carrying the tool's diagnostic output.
    fn run(
        &self,
        stage: RenderStage,
        args: &[OsString],
        on_progress: Option<ToolProgressFn<'_>>,
    ) -> SubburnResult<ToolOutput>;

    fn open_decoder(&self, path: &Path, info: &MediaInfo) -> SubburnResult<Box<dyn FrameSource>>;

    fn open_encoder(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> SubburnResult<Box<dyn FrameSink>>;
}

/// Build an argument vector from anything string- or path-like.
pub fn tool_args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}

/// Swap red and blue in place.
pub fn bgr_to_rgb(frame: &mut RgbImage) {
    for pixel in frame.pixels_mut() {
        pixel.0.swap(0, 2);
    }
}
