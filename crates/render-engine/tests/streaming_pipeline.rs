//! Renderer pipelines driven through an in-memory media engine.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use subburn_caption_model::{
    AnimationFidelity, AnimationKind, AudioOutcome, CaptionUnit, PositionPreset, RenderRequest,
    StyleConfig,
};
use subburn_common::config::{AppConfig, ProcessingMode, RendererKind};
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;
use subburn_render_engine::raster::find_system_font;
use subburn_render_engine::{
    burn_captions, ChannelOrder, FiltergraphRenderer, FrameSink, FrameSource, LiteRenderer,
    MediaEngine, MediaInfo, RenderJob, RendererRegistry, StreamingRenderer, SubtitleRenderer,
    ToolOutput, ToolProgress,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;
const FRAMES: u64 = 48;
const BACKGROUND: [u8; 3] = [200, 40, 10];

#[derive(Default)]
struct Calls {
    probes: usize,
    runs: Vec<(RenderStage, Vec<String>)>,
    encoded: u64,
    corner_pixels: Vec<[u8; 3]>,
    decoders_dropped: usize,
    encoders_dropped: usize,
}

struct FakeEngine {
    info: MediaInfo,
    order: ChannelOrder,
    fail_stage: Option<RenderStage>,
    decode_fails_at: Option<u64>,
    encode_fails_at: Option<u64>,
    calls: Arc<Mutex<Calls>>,
}

impl FakeEngine {
    fn new(has_audio: bool) -> Self {
        Self {
            info: MediaInfo {
                width: WIDTH,
                height: HEIGHT,
                duration_secs: FRAMES as f64 / 24.0,
                frame_count: Some(FRAMES),
                frame_rate: Some(24.0),
                has_audio,
            },
            order: ChannelOrder::Rgb,
            fail_stage: None,
            decode_fails_at: None,
            encode_fails_at: None,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    fn failing_at(mut self, stage: RenderStage) -> Self {
        self.fail_stage = Some(stage);
        self
    }

    fn decode_error_at(mut self, frame: u64) -> Self {
        self.decode_fails_at = Some(frame);
        self
    }

    fn encode_error_at(mut self, frame: u64) -> Self {
        self.encode_fails_at = Some(frame);
        self
    }

    fn bgr(mut self) -> Self {
        self.order = ChannelOrder::Bgr;
        self
    }
}

impl MediaEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn probe(&self, _path: &Path) -> SubburnResult<MediaInfo> {
        self.calls.lock().unwrap().probes += 1;
        Ok(self.info.clone())
    }

    fn run(
        &self,
        stage: RenderStage,
        args: &[OsString],
        on_progress: Option<&dyn Fn(&ToolProgress)>,
    ) -> SubburnResult<ToolOutput> {
        let recorded = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        self.calls.lock().unwrap().runs.push((stage, recorded));

        // the output path is always the last argument
        let output = PathBuf::from(args.last().unwrap());
        std::fs::write(&output, b"partial or complete output").unwrap();
        if self.fail_stage == Some(stage) {
            return Err(SubburnError::render(stage, "fake tool exited with 1: boom"));
        }
        if let Some(cb) = on_progress {
            cb(&ToolProgress {
                out_time_secs: 1.0,
                complete: false,
            });
            cb(&ToolProgress {
                out_time_secs: 2.0,
                complete: true,
            });
        }
        Ok(ToolOutput::default())
    }

    fn open_decoder(&self, _path: &Path, info: &MediaInfo) -> SubburnResult<Box<dyn FrameSource>> {
        Ok(Box::new(FakeDecoder {
            remaining: info.frame_count.unwrap_or(0),
            decoded: 0,
            fails_at: self.decode_fails_at,
            order: self.order,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn open_encoder(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        _fps: f64,
    ) -> SubburnResult<Box<dyn FrameSink>> {
        assert_eq!((width, height), (WIDTH, HEIGHT));
        Ok(Box::new(FakeEncoder {
            path: path.to_path_buf(),
            frames: 0,
            fails_at: self.encode_fails_at,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct FakeDecoder {
    remaining: u64,
    decoded: u64,
    fails_at: Option<u64>,
    order: ChannelOrder,
    calls: Arc<Mutex<Calls>>,
}

impl Drop for FakeDecoder {
    fn drop(&mut self) {
        self.calls.lock().unwrap().decoders_dropped += 1;
    }
}

impl FrameSource for FakeDecoder {
    fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    fn next_frame(&mut self, frame: &mut RgbImage) -> SubburnResult<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        if self.fails_at == Some(self.decoded) {
            return Err(SubburnError::render(
                RenderStage::Streaming,
                format!("corrupt packet at frame {}", self.decoded),
            ));
        }
        self.remaining -= 1;
        self.decoded += 1;
        let [r, g, b] = BACKGROUND;
        let pixel = match self.order {
            ChannelOrder::Rgb => Rgb([r, g, b]),
            ChannelOrder::Bgr => Rgb([b, g, r]),
        };
        for p in frame.pixels_mut() {
            *p = pixel;
        }
        Ok(true)
    }
}

struct FakeEncoder {
    path: PathBuf,
    frames: u64,
    fails_at: Option<u64>,
    calls: Arc<Mutex<Calls>>,
}

impl Drop for FakeEncoder {
    fn drop(&mut self) {
        self.calls.lock().unwrap().encoders_dropped += 1;
    }
}

impl FrameSink for FakeEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> SubburnResult<()> {
        if self.fails_at == Some(self.frames) {
            return Err(SubburnError::render(RenderStage::Encoding, "encoder pipe closed"));
        }
        self.frames += 1;
        self.calls
            .lock()
            .unwrap()
            .corner_pixels
            .push(frame.get_pixel(0, 0).0);
        Ok(())
    }

    fn finish(self: Box<Self>) -> SubburnResult<()> {
        self.calls.lock().unwrap().encoded = self.frames;
        std::fs::write(&self.path, format!("{} frames", self.frames))?;
        Ok(())
    }
}

fn request(dir: &Path, font: PathBuf) -> RenderRequest {
    let video = dir.join("in.mp4");
    std::fs::write(&video, b"source").unwrap();
    let style = StyleConfig::new("caption", font)
        .with_font_size(24)
        .with_position(PositionPreset::BottomCenter, 0, 50);
    RenderRequest::new(
        video,
        vec![
            CaptionUnit::new(0.5, 1.0, "Hello World"),
            CaptionUnit::new(0.8, 1.5, "Overlap"),
        ],
        style,
        dir.join("out/captioned.mp4"),
        24.0,
    )
}

fn system_font() -> Option<PathBuf> {
    let font = find_system_font();
    if font.is_none() {
        eprintln!("skipping: no system font found");
    }
    font
}

fn scratch_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".subburn-silent-"))
        .count()
}

#[test]
fn test_streaming_processes_every_frame_and_reattaches_audio() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);
    let renderer = StreamingRenderer::new(Arc::new(engine), 10);

    let result = renderer.render(&req, None).unwrap();

    assert!(result.is_success());
    assert_eq!(result.renderer_name, "pillow");
    assert_eq!(result.frames_processed, Some(FRAMES));
    assert_eq!(result.subtitle_count, 2);
    assert_eq!(result.audio, AudioOutcome::Reattached);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.encoded, FRAMES);
    assert_eq!(calls.runs.len(), 1);
    let (stage, args) = &calls.runs[0];
    assert_eq!(*stage, RenderStage::Remuxing);
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "1:a:0"));
    assert!(req.output_path.exists());
    assert_eq!(scratch_files(&dir.path().join("out")), 0);
}

#[test]
fn test_streaming_without_source_audio_writes_video_only() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(false);
    let calls = Arc::clone(&engine.calls);

    let result = StreamingRenderer::new(Arc::new(engine), 100)
        .render(&req, None)
        .unwrap();

    assert_eq!(result.audio, AudioOutcome::NoSourceAudio);
    assert!(calls.lock().unwrap().runs.is_empty());
    assert_eq!(
        std::fs::read_to_string(&req.output_path).unwrap(),
        format!("{FRAMES} frames")
    );
}

#[test]
fn test_remux_failure_degrades_to_video_only() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true).failing_at(RenderStage::Remuxing);

    let result = StreamingRenderer::new(Arc::new(engine), 100)
        .render(&req, None)
        .unwrap();

    assert!(result.is_success());
    assert!(matches!(result.audio, AudioOutcome::VideoOnlyFallback { .. }));
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&req.output_path).unwrap(),
        format!("{FRAMES} frames")
    );
}

#[test]
fn test_bgr_frames_are_converted_before_encoding() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(false).bgr();
    let calls = Arc::clone(&engine.calls);

    StreamingRenderer::new(Arc::new(engine), 100)
        .render(&req, None)
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.corner_pixels.len() as u64, FRAMES);
    assert!(calls.corner_pixels.iter().all(|p| *p == BACKGROUND));
}

#[test]
fn test_streaming_render_is_repeatable() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let renderer = StreamingRenderer::new(Arc::new(FakeEngine::new(true)), 100);

    let first = renderer.render(&req, None).unwrap();
    let second = renderer.render(&req, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_progress_reaches_completion() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    StreamingRenderer::new(Arc::new(FakeEngine::new(false)), 16)
        .render(
            &req,
            Some(Box::new(move |p| sink.lock().unwrap().push(p))),
        )
        .unwrap();

    let seen = seen.lock().unwrap();
    let streamed: Vec<u64> = seen
        .iter()
        .filter(|p| p.stage == RenderStage::Streaming)
        .map(|p| p.frames_processed)
        .collect();
    assert_eq!(streamed, vec![0, 16, 32, 48]);
    let last = seen.last().unwrap();
    assert_eq!(last.stage, RenderStage::Complete);
    assert_eq!(last.progress, 1.0);
}

#[test]
fn test_missing_font_fails_before_media_work() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), dir.path().join("missing.ttf"));
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);

    let err = StreamingRenderer::new(Arc::new(engine), 100)
        .render(&req, None)
        .unwrap_err();

    assert!(matches!(err, SubburnError::FontResolution { .. }));
    assert_eq!(calls.lock().unwrap().probes, 0);
    assert!(!req.output_path.exists());
}

#[test]
fn test_filtergraph_runs_one_drawtext_pass() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);

    let result = FiltergraphRenderer::new(Arc::new(engine), Default::default())
        .render(&req, None)
        .unwrap();

    assert_eq!(result.renderer_name, "ffmpeg");
    assert_eq!(result.animation, AnimationFidelity::Full);
    assert_eq!(result.audio, AudioOutcome::Copied);
    let calls = calls.lock().unwrap();
    let (stage, args) = &calls.runs[0];
    assert_eq!(*stage, RenderStage::Filtering);
    let vf = args
        .iter()
        .position(|a| a == "-vf")
        .map(|i| &args[i + 1])
        .unwrap();
    assert_eq!(vf.matches("drawtext=").count(), 2);
    assert!(vf.contains("enable='between(t,0.500000,1.000000)'"));
}

#[test]
fn test_filtergraph_reports_static_fallback_for_slide() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), font);
    req.style = req.style.with_animation(AnimationKind::SlideUp, 0.3);

    let result = FiltergraphRenderer::new(Arc::new(FakeEngine::new(true)), Default::default())
        .render(&req, None)
        .unwrap();

    assert!(result.is_success());
    assert!(matches!(
        result.animation,
        AnimationFidelity::StaticFallback { .. }
    ));
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_filtergraph_failure_leaves_no_output() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true).failing_at(RenderStage::Filtering);

    let err = FiltergraphRenderer::new(Arc::new(engine), Default::default())
        .render(&req, None)
        .unwrap_err();

    assert_eq!(err.stage(), RenderStage::Filtering);
    assert!(err.to_string().contains("boom"));
    assert!(!req.output_path.exists());
}

#[test]
fn test_filtergraph_missing_font_fails_before_media_work() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), dir.path().join("missing.ttf"));
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);

    let err = FiltergraphRenderer::new(Arc::new(engine), Default::default())
        .render(&req, None)
        .unwrap_err();

    assert!(matches!(err, SubburnError::FontResolution { .. }));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.probes, 0);
    assert!(calls.runs.is_empty());
    assert!(!req.output_path.exists());
}

#[test]
fn test_filtergraph_rejects_unparseable_font() {
    let dir = tempfile::tempdir().unwrap();
    let font = dir.path().join("broken.ttf");
    std::fs::write(&font, b"not a font").unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);

    let err = FiltergraphRenderer::new(Arc::new(engine), Default::default())
        .render(&req, None)
        .unwrap_err();

    assert!(matches!(err, SubburnError::FontResolution { .. }));
    assert!(calls.lock().unwrap().runs.is_empty());
}

#[test]
fn test_lite_missing_font_fails_before_media_work() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), dir.path().join("missing.ttf"));
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);

    let err = LiteRenderer::new(Arc::new(engine), Default::default())
        .render(&req, None)
        .unwrap_err();

    assert!(matches!(err, SubburnError::FontResolution { .. }));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.probes, 0);
    assert_eq!(calls.decoders_dropped, 0);
    assert!(!req.output_path.exists());
}

#[test]
fn test_decode_error_mid_stream_releases_everything() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true).decode_error_at(6);
    let calls = Arc::clone(&engine.calls);

    let err = StreamingRenderer::new(Arc::new(engine), 100)
        .render(&req, None)
        .unwrap_err();

    assert_eq!(err.stage(), RenderStage::Streaming);
    assert!(err.to_string().contains("frame 6"));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.corner_pixels.len(), 6);
    assert_eq!(calls.decoders_dropped, 1);
    assert_eq!(calls.encoders_dropped, 1);
    assert!(calls.runs.is_empty());
    assert_eq!(scratch_files(&dir.path().join("out")), 0);
    assert!(!req.output_path.exists());
}

#[test]
fn test_encode_error_mid_stream_releases_everything() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true).encode_error_at(10);
    let calls = Arc::clone(&engine.calls);

    let err = StreamingRenderer::new(Arc::new(engine), 100)
        .render(&req, None)
        .unwrap_err();

    assert_eq!(err.stage(), RenderStage::Encoding);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.corner_pixels.len(), 10);
    assert_eq!(calls.encoded, 0);
    assert_eq!(calls.decoders_dropped, 1);
    assert_eq!(calls.encoders_dropped, 1);
    assert_eq!(scratch_files(&dir.path().join("out")), 0);
    assert!(!req.output_path.exists());
}

#[test]
fn test_lite_encode_error_releases_scratch() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let engine = FakeEngine::new(true).encode_error_at(3);
    let calls = Arc::clone(&engine.calls);

    let err = LiteRenderer::new(Arc::new(engine), Default::default())
        .render(&req, None)
        .unwrap_err();

    assert_eq!(err.stage(), RenderStage::Encoding);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.encoders_dropped, 1);
    assert!(calls.runs.is_empty());
    assert_eq!(scratch_files(&dir.path().join("out")), 0);
    assert!(!req.output_path.exists());
}

#[tokio::test]
async fn test_empty_alignment_passes_video_through() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), PathBuf::from("/fonts/Caption.ttf"));
    req.alignment.clear();
    let output = req.output_path.clone();
    let engine = FakeEngine::new(false);
    let calls = Arc::clone(&engine.calls);
    let config = AppConfig {
        write_report: true,
        ..AppConfig::default()
    };
    let registry = RendererRegistry::new(Arc::new(engine), config);

    let result = burn_captions(RenderJob::new(req), registry, None)
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.subtitle_count, 0);
    assert_eq!(result.renderer_name, "passthrough");
    assert_eq!(result.audio, AudioOutcome::NoSourceAudio);
    assert!(output.exists());

    let calls = calls.lock().unwrap();
    let (stage, args) = &calls.runs[0];
    assert_eq!(*stage, RenderStage::Encoding);
    assert!(!args.iter().any(|a| a == "-vf"));

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output.with_extension("render-report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["result"]["renderer"], "passthrough");
    assert!(report["started_at"].is_string());
}

#[tokio::test]
async fn test_backend_mode_dispatches_requested_renderer() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let registry = RendererRegistry::new(Arc::new(FakeEngine::new(true)), AppConfig::default());
    let job = RenderJob::new(req)
        .with_mode(ProcessingMode::Backend)
        .with_renderer(RendererKind::Filtergraph);

    let result = burn_captions(job, registry, None).await.unwrap();
    assert_eq!(result.renderer_name, "ffmpeg");
}

#[tokio::test]
async fn test_auto_mode_uses_lite_for_short_clips() {
    let Some(font) = system_font() else { return };
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), font);
    let registry = RendererRegistry::new(Arc::new(FakeEngine::new(true)), AppConfig::default());

    let result = burn_captions(RenderJob::new(req).with_mode(ProcessingMode::Auto), registry, None)
        .await
        .unwrap();

    assert_eq!(result.renderer_name, "lite");
    assert_eq!(result.frames_processed, Some(FRAMES));
    assert_eq!(result.audio, AudioOutcome::Reattached);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_eagerly() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), PathBuf::from("/fonts/Caption.ttf"));
    req.video_path = dir.path().join("does-not-exist.mp4");
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);
    let registry = RendererRegistry::new(Arc::new(engine), AppConfig::default());

    let err = burn_captions(RenderJob::new(req), registry, None)
        .await
        .unwrap_err();

    assert!(err.is_input_error());
    assert_eq!(calls.lock().unwrap().probes, 0);
}

#[tokio::test]
async fn test_job_rejects_missing_font_before_probing() {
    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path(), dir.path().join("missing.ttf"));
    let engine = FakeEngine::new(true);
    let calls = Arc::clone(&engine.calls);
    let registry = RendererRegistry::new(Arc::new(engine), AppConfig::default());

    let err = burn_captions(RenderJob::new(req), registry, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SubburnError::FontResolution { .. }));
    assert!(err.is_input_error());
    assert_eq!(calls.lock().unwrap().probes, 0);
}
