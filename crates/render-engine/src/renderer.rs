//! Renderer contract and registry.

use std::sync::Arc;

use subburn_caption_model::{RenderRequest, RenderResult};
use subburn_common::config::{AppConfig, RendererKind};
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;

use crate::filtergraph::FiltergraphRenderer;
use crate::lite::LiteRenderer;
use crate::media::MediaEngine;
use crate::streaming::StreamingRenderer;

/// Progress callback for caption rendering.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Render progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames processed so far.
    pub frames_processed: u64,

    /// Expected total, from the probed source.
    pub total_frames: u64,

    pub stage: RenderStage,
}

impl RenderProgress {
    pub fn at(stage: RenderStage, frames_processed: u64, total_frames: u64) -> Self {
        let progress = if total_frames == 0 {
            0.0
        } else {
            (frames_processed as f64 / total_frames as f64).clamp(0.0, 1.0)
        };
        Self {
            progress,
            frames_processed,
            total_frames,
            stage,
        }
    }

    pub fn complete(frames_processed: u64) -> Self {
        Self {
            progress: 1.0,
            frames_processed,
            total_frames: frames_processed,
            stage: RenderStage::Complete,
        }
    }
}

pub(crate) fn report(progress: &Option<ProgressCallback>, update: RenderProgress) {
    if let Some(cb) = progress {
        cb(update);
    }
}

/// A caption burn-in backend.
pub trait SubtitleRenderer: Send + Sync {
    /// Name reported in results ("ffmpeg", "pillow", "lite").
    fn name(&self) -> &str;

    /// Eager input checks. Runs before any media is touched.
    fn validate(&self, request: &RenderRequest) -> SubburnResult<()> {
        request.validate()
    }

    /// Burn the captions in and write exactly one output file.
    fn render(
        &self,
        request: &RenderRequest,
        progress: Option<ProgressCallback>,
    ) -> SubburnResult<RenderResult>;

    /// Whether the backend's external tools are usable on this system.
    fn is_available(&self) -> bool;
}

/// Builds renderers over a shared media engine.
#[derive(Clone)]
pub struct RendererRegistry {
    engine: Arc<dyn MediaEngine>,
    config: AppConfig,
}

impl RendererRegistry {
    pub fn new(engine: Arc<dyn MediaEngine>, config: AppConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn create(&self, kind: RendererKind) -> Box<dyn SubtitleRenderer> {
        match kind {
            RendererKind::Filtergraph => Box::new(FiltergraphRenderer::new(
                Arc::clone(&self.engine),
                self.config.tools.clone(),
            )),
            RendererKind::Streaming => Box::new(StreamingRenderer::with_tools(
                Arc::clone(&self.engine),
                self.config.tools.clone(),
                self.config.progress_interval_frames,
            )),
        }
    }

    /// Look a renderer up by any of its accepted names.
    pub fn by_name(&self, name: &str) -> SubburnResult<Box<dyn SubtitleRenderer>> {
        let kind: RendererKind = name.parse()?;
        Ok(self.create(kind))
    }

    pub fn default_renderer(&self) -> Box<dyn SubtitleRenderer> {
        self.create(self.config.default_renderer)
    }

    /// The in-memory renderer used by lite mode.
    pub fn lite(&self) -> Box<dyn SubtitleRenderer> {
        Box::new(LiteRenderer::new(
            Arc::clone(&self.engine),
            self.config.tools.clone(),
        ))
    }

    /// First available renderer, starting with the configured default.
    pub fn first_available(&self) -> SubburnResult<Box<dyn SubtitleRenderer>> {
        let preferred = self.config.default_renderer;
        let fallback = match preferred {
            RendererKind::Filtergraph => RendererKind::Streaming,
            RendererKind::Streaming => RendererKind::Filtergraph,
        };
        [preferred, fallback]
            .into_iter()
            .map(|kind| self.create(kind))
            .find(|renderer| renderer.is_available())
            .ok_or_else(|| {
                SubburnError::unsupported("No supported renderer found (expected ffmpeg in PATH)")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let p = RenderProgress::at(RenderStage::Streaming, 50, 200);
        assert!((p.progress - 0.25).abs() < 1e-12);
        assert_eq!(RenderProgress::at(RenderStage::Streaming, 5, 0).progress, 0.0);
        assert_eq!(RenderProgress::at(RenderStage::Streaming, 300, 200).progress, 1.0);
        assert_eq!(RenderProgress::complete(7).stage, RenderStage::Complete);
    }
}
