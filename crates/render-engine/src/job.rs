//! Job entry point: mode selection, dispatch and the render report.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use subburn_caption_model::{AudioOutcome, RenderRequest, RenderResult};
use subburn_common::clock::{FrameClock, RenderClock};
use subburn_common::config::{AppConfig, ProcessingMode, RendererKind};
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;

use crate::ffmpeg::video_codec_args;
use crate::media::{tool_args, MediaEngine, ToolProgress};
use crate::raster::FontFace;
use crate::renderer::{report, ProgressCallback, RenderProgress, RendererRegistry};

/// Name reported for renders that had no captions to draw.
pub const PASSTHROUGH_RENDERER: &str = "passthrough";

/// A mode after `Auto` has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedMode {
    Lite,
    Backend(RendererKind),
}

/// Decide where frames live for a source of `duration_secs`.
pub fn select_mode(
    mode: ProcessingMode,
    renderer: RendererKind,
    duration_secs: f64,
    lite_threshold_secs: f64,
) -> ResolvedMode {
    match mode {
        ProcessingMode::Lite => ResolvedMode::Lite,
        ProcessingMode::Backend => ResolvedMode::Backend(renderer),
        ProcessingMode::Auto if duration_secs < lite_threshold_secs => ResolvedMode::Lite,
        ProcessingMode::Auto => ResolvedMode::Backend(renderer),
    }
}

/// One burn-in job as submitted by a caller.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub request: RenderRequest,
    /// Falls back to the configured default mode.
    pub mode: Option<ProcessingMode>,
    /// Falls back to the configured default renderer.
    pub renderer: Option<RendererKind>,
}

impl RenderJob {
    pub fn new(request: RenderRequest) -> Self {
        Self {
            request,
            mode: None,
            renderer: None,
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = Some(renderer);
        self
    }
}

/// Serialized next to the output when `write_report` is on.
#[derive(Debug, Serialize)]
pub struct RenderReport<'a> {
    pub result: &'a RenderResult,
    pub started_at: &'a str,
    pub elapsed_secs: f64,
}

/// `<output stem>.render-report.json` beside the output.
pub fn report_path(output: &Path) -> PathBuf {
    output.with_extension("render-report.json")
}

pub fn write_report(result: &RenderResult, clock: &RenderClock) -> SubburnResult<PathBuf> {
    let path = report_path(&result.output_path);
    let report = RenderReport {
        result,
        started_at: clock.started_at(),
        elapsed_secs: clock.elapsed_secs(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, json)?;
    tracing::debug!(path = %path.display(), "Render report written");
    Ok(path)
}

/// Run a job to completion on the blocking pool.
pub async fn burn_captions(
    job: RenderJob,
    registry: RendererRegistry,
    progress: Option<ProgressCallback>,
) -> SubburnResult<RenderResult> {
    tokio::task::spawn_blocking(move || burn_captions_blocking(&job, &registry, progress))
        .await
        .map_err(|e| SubburnError::Other(anyhow::anyhow!("render task failed: {e}")))?
}

/// Synchronous form of [`burn_captions`].
pub fn burn_captions_blocking(
    job: &RenderJob,
    registry: &RendererRegistry,
    progress: Option<ProgressCallback>,
) -> SubburnResult<RenderResult> {
    let clock = RenderClock::start();
    let request = &job.request;
    let config = registry.config();

    let result = if request.alignment.is_empty() {
        tracing::info!(video = %request.video_path.display(), "No captions to draw; passing video through");
        passthrough(request, registry.engine(), config, progress)?
    } else {
        request.validate()?;
        FontFace::load(&request.style.font_path)?;
        let info = registry.engine().probe(&request.video_path)?;
        let mode = select_mode(
            job.mode.unwrap_or(config.default_mode),
            job.renderer.unwrap_or(config.default_renderer),
            info.duration_secs,
            config.lite_threshold_secs,
        );
        let renderer = match mode {
            ResolvedMode::Lite => registry.lite(),
            ResolvedMode::Backend(kind) => registry.create(kind),
        };
        tracing::info!(
            ?mode,
            renderer = renderer.name(),
            duration_secs = info.duration_secs,
            "Dispatching render"
        );
        renderer.render(request, progress)?
    };

    if config.write_report {
        if let Err(e) = write_report(&result, &clock) {
            tracing::warn!(error = %e, "Failed to write render report");
        }
    }
    tracing::info!(
        renderer = %result.renderer_name,
        elapsed_secs = clock.elapsed_secs(),
        "Render complete"
    );
    Ok(result)
}

pub fn passthrough_args(request: &RenderRequest, config: &AppConfig) -> Vec<OsString> {
    let mut args = tool_args(["-y", "-nostdin", "-i"]);
    args.push(request.video_path.clone().into_os_string());
    args.extend(tool_args(["-map", "0:v:0", "-map", "0:a?"]));
    args.extend(video_codec_args(&config.tools));
    args.extend(tool_args(["-c:a", "copy", "-progress", "pipe:1", "-nostats"]));
    args.push(request.output_path.clone().into_os_string());
    args
}

/// Re-encode with audio copied and nothing drawn.
fn passthrough(
    request: &RenderRequest,
    engine: &Arc<dyn MediaEngine>,
    config: &AppConfig,
    progress: Option<ProgressCallback>,
) -> SubburnResult<RenderResult> {
    request.validate_media()?;
    let info = engine.probe(&request.video_path)?;
    let clock = FrameClock::new(request.fps)?;
    let total_frames = info.estimated_frames(clock.fps());

    let on_tool_progress = |state: &ToolProgress| {
        let frames = if state.complete {
            total_frames
        } else {
            clock.frame_at(state.out_time_secs).min(total_frames)
        };
        report(&progress, RenderProgress::at(RenderStage::Encoding, frames, total_frames));
    };
    let args = passthrough_args(request, config);
    if let Err(err) = engine.run(
        RenderStage::Encoding,
        &args,
        Some(&on_tool_progress as &dyn Fn(&ToolProgress)),
    ) {
        if request.output_path.exists() {
            let _ = std::fs::remove_file(&request.output_path);
        }
        return Err(err);
    }

    report(&progress, RenderProgress::complete(total_frames));
    let audio = if info.has_audio {
        AudioOutcome::Copied
    } else {
        AudioOutcome::NoSourceAudio
    };
    Ok(RenderResult::success(PASSTHROUGH_RENDERER, &request.output_path, 0).with_audio(audio))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_mode_uses_threshold() {
        let kind = RendererKind::Filtergraph;
        assert_eq!(select_mode(ProcessingMode::Auto, kind, 30.0, 120.0), ResolvedMode::Lite);
        assert_eq!(
            select_mode(ProcessingMode::Auto, kind, 120.0, 120.0),
            ResolvedMode::Backend(kind)
        );
    }

    #[test]
    fn test_explicit_modes_ignore_duration() {
        let kind = RendererKind::Streaming;
        assert_eq!(select_mode(ProcessingMode::Lite, kind, 9000.0, 120.0), ResolvedMode::Lite);
        assert_eq!(
            select_mode(ProcessingMode::Backend, kind, 1.0, 120.0),
            ResolvedMode::Backend(kind)
        );
    }

    #[test]
    fn test_report_path_sits_beside_output() {
        assert_eq!(
            report_path(Path::new("/out/clip.mp4")),
            PathBuf::from("/out/clip.render-report.json")
        );
    }
}
