//! Audio reattachment onto a silently re-encoded video.

use std::ffi::OsString;
use std::path::Path;

use subburn_caption_model::AudioOutcome;
use subburn_common::config::ToolConfig;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;

use crate::media::{tool_args, MediaEngine};

/// Arguments muxing video from `silent` (copied) with audio from `source`
/// (re-encoded), cut to the shorter stream.
pub fn remux_args(silent: &Path, source: &Path, output: &Path, tools: &ToolConfig) -> Vec<OsString> {
    let mut args = tool_args(["-y", "-nostdin", "-v", "error", "-i"]);
    args.push(silent.as_os_str().to_os_string());
    args.push("-i".into());
    args.push(source.as_os_str().to_os_string());
    args.extend(tool_args([
        "-map",
        "0:v:0",
        "-map",
        "1:a:0",
        "-c:v",
        "copy",
        "-c:a",
        tools.audio_codec.as_str(),
        "-shortest",
    ]));
    args.push(output.as_os_str().to_os_string());
    args
}

/// Produce `output` from the silent render plus the source's audio.
///
/// Audio problems never fail the render: without a source track, or when the
/// remux fails, the silent video is copied to `output` and the outcome says
/// why. Only failing to write `output` at all is an error.
pub fn reattach_audio(
    engine: &dyn MediaEngine,
    tools: &ToolConfig,
    silent: &Path,
    source: &Path,
    source_has_audio: bool,
    output: &Path,
) -> SubburnResult<AudioOutcome> {
    if !source_has_audio {
        tracing::info!(source = %source.display(), "Source has no audio; writing video-only output");
        copy_video_only(silent, output)?;
        return Ok(AudioOutcome::NoSourceAudio);
    }

    let args = remux_args(silent, source, output, tools);
    match engine.run(RenderStage::Remuxing, &args, None) {
        Ok(_) => {
            tracing::info!(output = %output.display(), "Audio reattached");
            Ok(AudioOutcome::Reattached)
        }
        Err(err) => {
            let warning = SubburnError::audio_remux(err.to_string());
            tracing::warn!(error = %warning, "Falling back to video-only output");
            if output.exists() {
                if let Err(e) = std::fs::remove_file(output) {
                    tracing::warn!(error = %e, "Failed to remove partial remux output");
                }
            }
            copy_video_only(silent, output)?;
            Ok(AudioOutcome::VideoOnlyFallback {
                reason: err.to_string(),
            })
        }
    }
}

fn copy_video_only(silent: &Path, output: &Path) -> SubburnResult<()> {
    std::fs::copy(silent, output).map_err(|e| {
        SubburnError::render(
            RenderStage::Remuxing,
            format!(
                "failed to copy {} to {}: {e}",
                silent.display(),
                output.display()
            ),
        )
    })?;
    Ok(())
}
