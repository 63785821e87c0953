//! Render requests and results.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;

use crate::caption::CaptionUnit;
use crate::style::{AnimationKind, StyleConfig};

/// Everything a renderer needs for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub video_path: PathBuf,
    pub alignment: Vec<CaptionUnit>,
    pub style: StyleConfig,
    pub output_path: PathBuf,
    /// Frame rate used to turn frame indices into caption time.
    pub fps: f64,
}

impl RenderRequest {
    pub fn new(
        video_path: impl Into<PathBuf>,
        alignment: Vec<CaptionUnit>,
        style: StyleConfig,
        output_path: impl Into<PathBuf>,
        fps: f64,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            alignment,
            style,
            output_path: output_path.into(),
            fps,
        }
    }

    /// Full eager validation: media checks plus a non-empty alignment.
    pub fn validate(&self) -> SubburnResult<()> {
        if self.alignment.is_empty() {
            return Err(SubburnError::invalid_input("alignment is empty"));
        }
        self.validate_media()
    }

    /// Validation that tolerates an empty alignment.
    ///
    /// Creates the output directory if it does not exist yet.
    pub fn validate_media(&self) -> SubburnResult<()> {
        if !self.video_path.is_file() {
            return Err(SubburnError::invalid_input(format!(
                "video not found: {}",
                self.video_path.display()
            )));
        }
        for (index, unit) in self.alignment.iter().enumerate() {
            unit.validate(index)?;
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(SubburnError::invalid_input(format!(
                "fps must be a positive number, got {}",
                self.fps
            )));
        }
        self.style.validate()?;

        if same_file(&self.video_path, &self.output_path) {
            return Err(SubburnError::invalid_input(format!(
                "output path must differ from the input video: {}",
                self.output_path.display()
            )));
        }
        ensure_output_dir(&self.output_path)
    }

    pub fn subtitle_count(&self) -> usize {
        self.alignment.len()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn ensure_output_dir(output: &Path) -> SubburnResult<()> {
    let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    std::fs::create_dir_all(parent).map_err(|e| {
        SubburnError::invalid_input(format!(
            "cannot create output directory {}: {e}",
            parent.display()
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Success,
    Failure,
}

/// How faithfully the requested animation was reproduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationFidelity {
    Full,
    /// The backend drew the caption statically instead of `requested`.
    StaticFallback { requested: AnimationKind },
}

/// What happened to the source audio track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioOutcome {
    /// Copied verbatim during a single-pass encode.
    Copied,
    /// Re-encoded and muxed onto a silent video stream.
    Reattached,
    /// The source had no audio stream.
    NoSourceAudio,
    /// Remux failed; the output is the silent video.
    VideoOnlyFallback { reason: String },
    /// The render failed before audio was handled.
    NotProcessed,
}

/// Terminal value of a render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub status: RenderStatus,
    pub output_path: PathBuf,
    pub subtitle_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_processed: Option<u64>,
    #[serde(rename = "renderer")]
    pub renderer_name: String,
    pub animation: AnimationFidelity,
    pub audio: AudioOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<RenderStage>,
}

impl RenderResult {
    pub fn success(
        renderer_name: impl Into<String>,
        output_path: impl Into<PathBuf>,
        subtitle_count: usize,
    ) -> Self {
        Self {
            status: RenderStatus::Success,
            output_path: output_path.into(),
            subtitle_count,
            frames_processed: None,
            renderer_name: renderer_name.into(),
            animation: AnimationFidelity::Full,
            audio: AudioOutcome::Copied,
            warnings: Vec::new(),
            diagnostic: None,
            failed_stage: None,
        }
    }

    /// Failure form of a result, carrying the error text and its stage.
    pub fn failure(
        renderer_name: impl Into<String>,
        output_path: impl Into<PathBuf>,
        subtitle_count: usize,
        error: &SubburnError,
    ) -> Self {
        Self {
            status: RenderStatus::Failure,
            output_path: output_path.into(),
            subtitle_count,
            frames_processed: None,
            renderer_name: renderer_name.into(),
            animation: AnimationFidelity::Full,
            audio: AudioOutcome::NotProcessed,
            warnings: Vec::new(),
            diagnostic: Some(error.to_string()),
            failed_stage: Some(error.stage()),
        }
    }

    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames_processed = Some(frames);
        self
    }

    pub fn with_audio(mut self, audio: AudioOutcome) -> Self {
        if let AudioOutcome::VideoOnlyFallback { reason } = &audio {
            self.warnings
                .push(format!("audio not reattached, output is video-only: {reason}"));
        }
        self.audio = audio;
        self
    }

    pub fn with_animation(mut self, animation: AnimationFidelity) -> Self {
        if let AnimationFidelity::StaticFallback { requested } = &animation {
            self.warnings.push(format!(
                "{requested} animation is not supported by the {} renderer; captions drawn statically",
                self.renderer_name
            ));
        }
        self.animation = animation;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RenderStatus::Success
    }
}
