//! Application configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SubburnError;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the font files styles refer to by file name.
    pub font_dir: PathBuf,

    /// Renderer used in backend mode when the caller does not pick one.
    pub default_renderer: RendererKind,

    /// Processing mode used when the caller does not pick one.
    pub default_mode: ProcessingMode,

    /// Sources shorter than this are processed in lite mode under `auto`.
    pub lite_threshold_secs: f64,

    /// Streaming progress is reported every this many frames.
    pub progress_interval_frames: u64,

    /// Write `<output>.render-report.json` after each render.
    #[serde(default)]
    pub write_report: bool,

    /// External tool settings.
    pub tools: ToolConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// External encode/decode tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// ffmpeg binary (name on PATH or absolute path).
    pub ffmpeg: PathBuf,

    /// ffprobe binary.
    pub ffprobe: PathBuf,

    /// Upper bound for any run-to-completion tool invocation.
    pub timeout_secs: u64,

    /// Video encoder for re-encoded streams.
    pub video_codec: String,

    /// Encoder speed/quality preset.
    pub preset: String,

    /// Constant rate factor (lower is better quality).
    pub crf: u8,

    /// Audio encoder used when reattaching the source track.
    pub audio_codec: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "subburn=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

/// Backend renderer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// One-pass declarative text overlay evaluated by ffmpeg.
    Filtergraph,
    /// Frame-by-frame decode, rasterize, encode.
    Streaming,
}

/// Where frames live while captions are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Lite for short sources, backend otherwise.
    Auto,
    /// Whole video held in memory.
    Lite,
    /// File-based renderer selected by [`RendererKind`].
    Backend,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            font_dir: default_font_dir(),
            default_renderer: RendererKind::Filtergraph,
            default_mode: ProcessingMode::Auto,
            lite_threshold_secs: 120.0,
            progress_interval_frames: 100,
            write_report: false,
            tools: ToolConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            timeout_secs: 3600,
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl RendererKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RendererKind::Filtergraph => "ffmpeg",
            RendererKind::Streaming => "pillow",
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RendererKind {
    type Err = SubburnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" | "filtergraph" => Ok(RendererKind::Filtergraph),
            "pillow" | "streaming" | "frames" => Ok(RendererKind::Streaming),
            other => Err(SubburnError::invalid_input(format!(
                "Unknown renderer: {other}. Use: ffmpeg, pillow"
            ))),
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessingMode::Auto => "auto",
            ProcessingMode::Lite => "lite",
            ProcessingMode::Backend => "backend",
        })
    }
}

impl FromStr for ProcessingMode {
    type Err = SubburnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ProcessingMode::Auto),
            "lite" => Ok(ProcessingMode::Lite),
            "backend" => Ok(ProcessingMode::Backend),
            other => Err(SubburnError::invalid_input(format!(
                "Unknown processing mode: {other}. Use: auto, lite, backend"
            ))),
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("subburn").join("config.json")
}

/// Default font directory.
fn default_font_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("subburn").join("fonts")
}
