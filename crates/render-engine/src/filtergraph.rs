//! Single-pass ffmpeg `drawtext` renderer.
//!
//! Every caption becomes one `drawtext` filter gated by `enable`, and the
//! filters are chained into one `-vf` graph. ffmpeg evaluates the position
//! and fade expressions per frame. Slide and zoom cannot be expressed
//! together with per-caption gating, so they are drawn statically and the
//! result says so.

use std::ffi::OsString;
use std::sync::Arc;

use subburn_caption_model::{
    AnimationFidelity, AnimationKind, AudioOutcome, CaptionUnit, PositionPreset, RenderRequest,
    RenderResult, StyleConfig,
};
use subburn_common::clock::FrameClock;
use subburn_common::config::ToolConfig;
use subburn_common::error::SubburnResult;
use subburn_common::stage::RenderStage;

use crate::ffmpeg::video_codec_args;
use crate::media::{tool_args, MediaEngine, ToolProgress};
use crate::raster::FontFace;
use crate::renderer::{report, ProgressCallback, RenderProgress, SubtitleRenderer};

/// How aggressively values are escaped before embedding in a filtergraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    /// Backslash, single quote, colon, comma.
    Standard,
    /// Standard plus `[`, `]` and `;`, which end a filter inside a graph.
    Strict,
}

fn escape_chars(raw: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        if ch == '\\' || specials.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape a filter option value: first for the option parser, then for the
/// graph parser.
pub fn escape_filter_value(raw: &str, mode: EscapeMode) -> String {
    let option_level = escape_chars(raw, &['\'', ':']);
    match mode {
        EscapeMode::Standard => escape_chars(&option_level, &['\'', ',']),
        EscapeMode::Strict => escape_chars(&option_level, &['\'', ',', ';', '[', ']']),
    }
}

/// Escape caption text for `drawtext`, which also expands `%{...}`.
pub fn escape_drawtext(raw: &str, mode: EscapeMode) -> String {
    escape_filter_value(&escape_chars(raw, &['%']), mode)
}

/// Forward slashes, then the usual value escaping (drive letters carry `:`).
pub fn normalize_font_path(path: &std::path::Path) -> String {
    let forward = path.to_string_lossy().replace('\\', "/");
    escape_filter_value(&forward, EscapeMode::Strict)
}

/// `x` and `y` expressions for a preset, evaluated by ffmpeg per frame.
pub fn position_expressions(style: &StyleConfig) -> (String, String) {
    const CENTER_X: &str = "(w-text_w)/2";
    match style.position {
        PositionPreset::BottomCenter => (CENTER_X.to_string(), format!("h-{}", style.y_position)),
        PositionPreset::TopCenter => (CENTER_X.to_string(), style.y_position.to_string()),
        PositionPreset::Center => (CENTER_X.to_string(), "(h-text_h)/2".to_string()),
        PositionPreset::Custom => (style.x_position.to_string(), style.y_position.to_string()),
    }
}

/// Three-branch fade: ramp up, hold, ramp down.
pub fn fade_alpha_expression(unit: &CaptionUnit, duration: f64) -> String {
    let (start, end, d) = (unit.start, unit.end, duration);
    format!(
        "if(lt(t,{fade_in_end:.6}),(t-{start:.6})/{d:.6},if(gt(t,{fade_out_start:.6}),({end:.6}-t)/{d:.6},1))",
        fade_in_end = start + d,
        fade_out_start = end - d,
    )
}

/// How `style.animation` maps onto drawtext.
pub fn animation_fidelity(style: &StyleConfig) -> AnimationFidelity {
    match style.animation {
        AnimationKind::None | AnimationKind::Fade => AnimationFidelity::Full,
        requested @ (AnimationKind::SlideUp | AnimationKind::SlideDown | AnimationKind::Zoom) => {
            AnimationFidelity::StaticFallback { requested }
        }
    }
}

/// One `drawtext` filter for one caption.
pub fn drawtext_filter(unit: &CaptionUnit, style: &StyleConfig) -> String {
    let (x, y) = position_expressions(style);
    let mut parts = vec![
        format!("drawtext=fontfile={}", normalize_font_path(&style.font_path)),
        format!("text={}", escape_drawtext(&unit.text, EscapeMode::Strict)),
        format!("fontsize={}", style.font_size),
        format!("fontcolor={}", style.font_color.ffmpeg_value()),
    ];
    if style.stroke_width > 0 {
        parts.push(format!("borderw={}", style.stroke_width));
        parts.push(format!("bordercolor={}", style.stroke_color.ffmpeg_value()));
    }
    parts.push(format!("x='{x}'"));
    parts.push(format!("y='{y}'"));
    if style.animation == AnimationKind::Fade {
        parts.push(format!(
            "alpha='{}'",
            fade_alpha_expression(unit, style.animation_duration)
        ));
    }
    parts.push(format!(
        "enable='between(t,{:.6},{:.6})'",
        unit.start, unit.end
    ));
    parts.join(":")
}

/// The whole `-vf` graph: one drawtext per caption, chained.
pub fn build_filter_chain(alignment: &[CaptionUnit], style: &StyleConfig) -> String {
    alignment
        .iter()
        .map(|unit| drawtext_filter(unit, style))
        .collect::<Vec<_>>()
        .join(",")
}

/// Full ffmpeg argument list for one filtergraph pass.
pub fn build_args(request: &RenderRequest, filter: &str, tools: &ToolConfig) -> Vec<OsString> {
    let mut args = tool_args(["-y", "-nostdin", "-i"]);
    args.push(request.video_path.clone().into_os_string());
    args.extend(tool_args(["-vf", filter, "-map", "0:v:0", "-map", "0:a?"]));
    args.extend(video_codec_args(tools));
    args.extend(tool_args(["-c:a", "copy", "-progress", "pipe:1", "-nostats"]));
    args.push(request.output_path.clone().into_os_string());
    args
}

/// Renders captions through ffmpeg `drawtext` in one decode/encode pass.
pub struct FiltergraphRenderer {
    engine: Arc<dyn MediaEngine>,
    tools: ToolConfig,
}

impl FiltergraphRenderer {
    pub fn new(engine: Arc<dyn MediaEngine>, tools: ToolConfig) -> Self {
        Self { engine, tools }
    }
}

impl SubtitleRenderer for FiltergraphRenderer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn render(
        &self,
        request: &RenderRequest,
        progress: Option<ProgressCallback>,
    ) -> SubburnResult<RenderResult> {
        self.validate(request)?;
        // ffmpeg only reports an unusable font after decoding has started
        let face = FontFace::load(&request.style.font_path)?;
        tracing::debug!(font = %face.path().display(), "Caption font resolved");

        let info = self.engine.probe(&request.video_path)?;
        let clock = FrameClock::new(request.fps)?;
        let total_frames = info.estimated_frames(clock.fps());

        let fidelity = animation_fidelity(&request.style);
        if let AnimationFidelity::StaticFallback { requested } = &fidelity {
            tracing::warn!(
                animation = %requested,
                renderer = self.name(),
                "Animation not expressible in drawtext; captions drawn statically"
            );
        }

        let filter = build_filter_chain(&request.alignment, &request.style);
        let args = build_args(request, &filter, &self.tools);
        tracing::info!(
            captions = request.alignment.len(),
            filter_len = filter.len(),
            total_frames,
            output = %request.output_path.display(),
            "Starting filtergraph render"
        );

        report(&progress, RenderProgress::at(RenderStage::Filtering, 0, total_frames));
        let on_tool_progress = |state: &ToolProgress| {
            let frames = if state.complete {
                total_frames
            } else {
                clock.frame_at(state.out_time_secs).min(total_frames)
            };
            report(&progress, RenderProgress::at(RenderStage::Filtering, frames, total_frames));
        };

        let run = self.engine.run(
            RenderStage::Filtering,
            &args,
            Some(&on_tool_progress as &dyn Fn(&ToolProgress)),
        );
        if let Err(err) = run {
            if request.output_path.exists() {
                if let Err(e) = std::fs::remove_file(&request.output_path) {
                    tracing::warn!(error = %e, "Failed to remove partial output");
                }
            }
            return Err(err);
        }

        report(&progress, RenderProgress::complete(total_frames));
        let audio = if info.has_audio {
            AudioOutcome::Copied
        } else {
            AudioOutcome::NoSourceAudio
        };
        Ok(
            RenderResult::success(self.name(), &request.output_path, request.alignment.len())
                .with_audio(audio)
                .with_animation(fidelity),
        )
    }

    fn is_available(&self) -> bool {
        self.engine.is_available()
    }
}
