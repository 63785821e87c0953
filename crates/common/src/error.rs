//! Error types shared across Subburn crates.

use std::path::PathBuf;

use crate::stage::RenderStage;

/// Top-level error type for Subburn operations.
#[derive(Debug, thiserror::Error)]
pub enum SubburnError {
    /// Missing video, empty alignment, or out-of-range style values.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Font resolution failed for {}: {message}", path.display())]
    FontResolution { path: PathBuf, message: String },

    /// An external tool exited non-zero, timed out, or could not be driven.
    #[error("Render failed during {stage}: {message}")]
    RenderFailure { stage: RenderStage, message: String },

    /// Audio reattachment failed. Never escapes a render call; callers
    /// downgrade it to a warning and keep the video-only output.
    #[error("Audio remux failed: {message}")]
    AudioRemux { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SubburnError.
pub type SubburnResult<T> = Result<T, SubburnError>;

impl SubburnError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn font(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::FontResolution {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn render(stage: RenderStage, msg: impl Into<String>) -> Self {
        Self::RenderFailure {
            stage,
            message: msg.into(),
        }
    }

    pub fn audio_remux(msg: impl Into<String>) -> Self {
        Self::AudioRemux {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Stage the error belongs to, for failure reports.
    pub fn stage(&self) -> RenderStage {
        match self {
            SubburnError::InvalidInput { .. }
            | SubburnError::FontResolution { .. }
            | SubburnError::FileNotFound { .. }
            | SubburnError::Config { .. } => RenderStage::Validating,
            SubburnError::RenderFailure { stage, .. } => *stage,
            SubburnError::AudioRemux { .. } => RenderStage::Remuxing,
            _ => RenderStage::Failed,
        }
    }

    /// True for errors that abort before any media was produced.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SubburnError::InvalidInput { .. }
                | SubburnError::FontResolution { .. }
                | SubburnError::FileNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_failure_names_stage() {
        let err = SubburnError::render(RenderStage::Filtering, "ffmpeg exited with status 1: boom");
        assert_eq!(
            err.to_string(),
            "Render failed during filtering: ffmpeg exited with status 1: boom"
        );
        assert_eq!(err.stage(), RenderStage::Filtering);
    }

    #[test]
    fn test_input_errors_map_to_validating() {
        let err = SubburnError::invalid_input("Alignment data is empty");
        assert!(err.is_input_error());
        assert_eq!(err.stage(), RenderStage::Validating);

        let font = SubburnError::font("/fonts/missing.ttf", "no such file");
        assert!(font.to_string().contains("/fonts/missing.ttf"));
        assert!(font.is_input_error());
    }
}
