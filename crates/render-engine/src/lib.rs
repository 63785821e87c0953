//! Subburn Render Engine
//!
//! Burns timed captions into a video. Two file-based backends share one
//! contract, plus an in-memory mode for short clips.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ──┐
//!              ├── probe ── mode selector ──┬── filtergraph: drawtext chain, one ffmpeg pass
//! alignment ───┘                            │
//!                                           ├── streaming: decode → paint → encode, per frame
//!                                           │                                   │
//!                                           └── lite: decode all → paint → encode
//!                                                                               │
//!                                                               reattach source audio
//!                                                                               │
//!                                                                               ▼
//!                                                                          output.mp4
//! ```

pub mod ffmpeg;
pub mod filtergraph;
pub mod job;
pub mod lite;
pub mod media;
pub mod raster;
pub mod remux;
pub mod renderer;
pub mod streaming;

pub use ffmpeg::FfmpegEngine;
pub use filtergraph::FiltergraphRenderer;
pub use job::{burn_captions, burn_captions_blocking, select_mode, RenderJob, ResolvedMode};
pub use lite::{paint_frames, paint_frames_with, LiteRenderer};
pub use media::{ChannelOrder, FrameSink, FrameSource, MediaEngine, MediaInfo, ToolOutput, ToolProgress};
pub use raster::{CaptionPainter, FontFace, TextMask};
pub use remux::reattach_audio;
pub use renderer::{ProgressCallback, RenderProgress, RendererRegistry, SubtitleRenderer};
pub use streaming::StreamingRenderer;
