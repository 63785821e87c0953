//! Burn captions into a video.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;

use subburn_caption_model::{
    load_alignment, save_sidecar, AnimationKind, Color, FontCatalog, PositionPreset,
    RenderRequest, RenderResult, StyleConfig,
};
use subburn_common::config::{AppConfig, ProcessingMode, RendererKind};
use subburn_common::error::SubburnResult;
use subburn_render_engine::{
    burn_captions, FfmpegEngine, MediaEngine, RenderJob, RenderProgress, RendererRegistry,
};

const FALLBACK_FPS: f64 = 30.0;

#[derive(Args)]
pub struct RenderArgs {
    /// Source video
    pub video: PathBuf,

    /// Alignment JSON: [{"start", "end", "value"}, ...]
    #[arg(short, long)]
    pub alignment: PathBuf,

    /// Output file (defaults to <video>_captioned.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Font file name in the font directory, or a path
    #[arg(long)]
    pub font: String,

    /// Font directory (defaults to the configured one)
    #[arg(long)]
    pub font_dir: Option<PathBuf>,

    #[arg(long, default_value = "100")]
    pub font_size: u32,

    #[arg(long, default_value = "white")]
    pub font_color: String,

    #[arg(long, default_value = "3")]
    pub stroke_width: u32,

    #[arg(long, default_value = "black")]
    pub stroke_color: String,

    /// Animation: none|fade|slide_up|slide_down|zoom
    #[arg(long, default_value = "none")]
    pub animation: String,

    /// Animation duration in seconds
    #[arg(long, default_value = "0.3")]
    pub animation_duration: f64,

    /// Position: bottom_center|top_center|center|custom
    #[arg(long, default_value = "bottom_center")]
    pub position: String,

    #[arg(long, default_value = "0")]
    pub x: i32,

    #[arg(long, default_value = "100")]
    pub y: i32,

    /// Frame rate for caption timing (defaults to the source's)
    #[arg(long)]
    pub fps: Option<f64>,

    /// Processing mode: auto|lite|backend
    #[arg(long)]
    pub mode: Option<String>,

    /// Backend renderer: ffmpeg|pillow
    #[arg(long)]
    pub renderer: Option<String>,

    /// Also write the captions as an .srt or .vtt file
    #[arg(long)]
    pub sidecar: Option<PathBuf>,
}

pub async fn run(args: RenderArgs, config: AppConfig) -> anyhow::Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.video));
    let engine: Arc<dyn MediaEngine> = Arc::new(FfmpegEngine::new(config.tools.clone()));

    let job = match build_job(&args, &output, &config, engine.as_ref()) {
        Ok(job) => job,
        Err(e) => return report_failure(&output, 0, &e),
    };
    let subtitle_count = job.request.subtitle_count();

    if let Some(sidecar) = &args.sidecar {
        save_sidecar(&job.request.alignment, sidecar)?;
    }

    let progress: Box<dyn Fn(RenderProgress) + Send> = Box::new(|p| {
        eprint!(
            "\r  {}: {:.1}% ({}/{} frames)  ",
            p.stage,
            p.progress * 100.0,
            p.frames_processed,
            p.total_frames,
        );
        let _ = std::io::stderr().flush();
    });

    let registry = RendererRegistry::new(engine, config);
    match burn_captions(job, registry, Some(progress)).await {
        Ok(result) => {
            eprintln!();
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            eprintln!();
            report_failure(&output, subtitle_count, &e)
        }
    }
}

fn build_job(
    args: &RenderArgs,
    output: &Path,
    config: &AppConfig,
    engine: &dyn MediaEngine,
) -> SubburnResult<RenderJob> {
    let alignment = load_alignment(&args.alignment)?;

    let catalog = FontCatalog::new(
        args.font_dir
            .clone()
            .unwrap_or_else(|| config.font_dir.clone()),
    );
    let font_path = catalog.resolve(&args.font)?;
    let family = font_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.font.clone());

    let style = StyleConfig::new(family, font_path)
        .with_font_size(args.font_size)
        .with_font_color(args.font_color.parse::<Color>()?)
        .with_stroke(args.stroke_width, args.stroke_color.parse::<Color>()?)
        .with_animation(
            args.animation.parse::<AnimationKind>()?,
            args.animation_duration,
        )
        .with_position(args.position.parse::<PositionPreset>()?, args.x, args.y);

    let fps = match args.fps {
        Some(fps) => fps,
        None => source_fps(engine, &args.video),
    };

    let mut job = RenderJob::new(RenderRequest::new(
        &args.video,
        alignment,
        style,
        output,
        fps,
    ));
    if let Some(mode) = &args.mode {
        job = job.with_mode(mode.parse::<ProcessingMode>()?);
    }
    if let Some(renderer) = &args.renderer {
        job = job.with_renderer(renderer.parse::<RendererKind>()?);
    }
    Ok(job)
}

/// The source's frame rate, or 30 when it cannot be probed. A missing
/// source is reported later by request validation.
fn source_fps(engine: &dyn MediaEngine, video: &Path) -> f64 {
    if !video.is_file() {
        return FALLBACK_FPS;
    }
    match engine.probe(video) {
        Ok(info) => info.frame_rate.unwrap_or(FALLBACK_FPS),
        Err(e) => {
            tracing::debug!(error = %e, "Could not probe frame rate, using {FALLBACK_FPS}");
            FALLBACK_FPS
        }
    }
}

fn default_output_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = video
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    video.with_file_name(format!("{stem}_captioned.{ext}"))
}

fn report_failure(
    output: &Path,
    subtitle_count: usize,
    error: &subburn_common::error::SubburnError,
) -> anyhow::Result<()> {
    let result = RenderResult::failure("subburn", output, subtitle_count, error);
    println!("{}", serde_json::to_string_pretty(&result)?);
    anyhow::bail!("render failed: {error}")
}
