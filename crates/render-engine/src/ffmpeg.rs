//! ffmpeg/ffprobe implementation of [`MediaEngine`].

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbImage;
use serde::Deserialize;

use subburn_common::config::ToolConfig;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_common::stage::RenderStage;

use crate::media::{
    tool_args, ChannelOrder, FrameSink, FrameSource, MediaEngine, MediaInfo, ToolOutput,
    ToolProgress, ToolProgressFn,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drives the system `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    tools: ToolConfig,
}

impl FfmpegEngine {
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolConfig {
        &self.tools
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs.max(1))
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new(ToolConfig::default())
    }
}

impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_runs(&self.tools.ffmpeg) && command_runs(&self.tools.ffprobe)
    }

    fn probe(&self, path: &Path) -> SubburnResult<MediaInfo> {
        let mut args = tool_args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ]);
        args.push(path.as_os_str().to_os_string());

        let output = run_tool(
            &self.tools.ffprobe,
            RenderStage::Probing,
            &args,
            self.timeout(),
            None,
        )?;
        let info = parse_probe_output(&output.stdout)?;
        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            duration_secs = info.duration_secs,
            has_audio = info.has_audio,
            "Probed source video"
        );
        Ok(info)
    }

    fn run(
        &self,
        stage: RenderStage,
        args: &[OsString],
        on_progress: Option<ToolProgressFn<'_>>,
    ) -> SubburnResult<ToolOutput> {
        run_tool(&self.tools.ffmpeg, stage, args, self.timeout(), on_progress)
    }

    fn open_decoder(&self, path: &Path, info: &MediaInfo) -> SubburnResult<Box<dyn FrameSource>> {
        let decoder = FfmpegDecoder::spawn(&self.tools.ffmpeg, path, info)?;
        Ok(Box::new(decoder))
    }

    fn open_encoder(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> SubburnResult<Box<dyn FrameSink>> {
        let encoder = FfmpegEncoder::spawn(&self.tools, path, width, height, fps)?;
        Ok(Box::new(encoder))
    }
}

/// Video encode arguments shared by every ffmpeg pass that produces H.264.
pub fn video_codec_args(tools: &ToolConfig) -> Vec<OsString> {
    tool_args([
        "-c:v".to_string(),
        tools.video_codec.clone(),
        "-preset".to_string(),
        tools.preset.clone(),
        "-crf".to_string(),
        tools.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ])
}

/// Whether `binary -version` runs and exits cleanly.
pub fn command_runs(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn tool_name(binary: &Path) -> String {
    binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| binary.display().to_string())
}

/// Kills and reaps the child unless it has already been waited on.
struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    fn get_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    fn take(&mut self) -> Option<Child> {
        self.child.take()
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

fn drain_stderr<R: Read + Send + 'static>(stderr: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read stderr: {err}>"),
        }
    })
}

fn join_stderr(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|h| {
            h.join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
        })
        .unwrap_or_default()
}

fn run_tool(
    binary: &Path,
    stage: RenderStage,
    args: &[OsString],
    timeout: Duration,
    on_progress: Option<ToolProgressFn<'_>>,
) -> SubburnResult<ToolOutput> {
    let name = tool_name(binary);
    tracing::debug!(tool = %name, ?args, "Running external tool");

    let started = Instant::now();
    let child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SubburnError::render(stage, format!("Failed to start {name}: {e}")))?;
    let mut guard = ChildGuard::new(child);
    let child = guard
        .get_mut()
        .ok_or_else(|| SubburnError::render(stage, format!("{name} exited before start")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SubburnError::render(stage, format!("Failed to capture {name} stdout")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SubburnError::render(stage, format!("Failed to capture {name} stderr")))?;
    let stderr_task = drain_stderr(stderr);

    let (tx, rx) = mpsc::channel::<String>();
    let stdout_task = std::thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let deadline = started + timeout;
    let mut stdout_text = String::new();
    let mut progress = ToolProgress::default();
    loop {
        if Instant::now() >= deadline {
            // reader threads are left to finish on their own once the pipes close
            drop(guard);
            return Err(SubburnError::render(
                stage,
                format!("{name} timed out after {}s", timeout.as_secs()),
            ));
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                if let Some((key, value)) = line.trim().split_once('=') {
                    if progress.update(key, value) {
                        if let Some(cb) = on_progress {
                            cb(&progress);
                        }
                    }
                }
                stdout_text.push_str(&line);
                stdout_text.push('\n');
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let _ = stdout_task.join();

    let status = loop {
        let child = guard
            .get_mut()
            .ok_or_else(|| SubburnError::render(stage, format!("{name} handle lost")))?;
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                drop(guard);
                return Err(SubburnError::render(
                    stage,
                    format!("{name} timed out after {}s", timeout.as_secs()),
                ));
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(SubburnError::render(
                    stage,
                    format!("Failed to wait on {name}: {e}"),
                ))
            }
        }
    };
    guard.take();

    let stderr_output = join_stderr(Some(stderr_task));
    if !status.success() {
        return Err(SubburnError::render(
            stage,
            format!("{name} exited with {status}: {}", stderr_output.trim()),
        ));
    }

    Ok(ToolOutput {
        stdout: stdout_text,
        stderr: stderr_output,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_output(json: &str) -> SubburnResult<MediaInfo> {
    let parsed: ProbeOutput = serde_json::from_str(json).map_err(|e| {
        SubburnError::render(RenderStage::Probing, format!("ffprobe json parse failed: {e}"))
    })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SubburnError::render(RenderStage::Probing, "no video stream found"))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(SubburnError::render(
                RenderStage::Probing,
                "missing video dimensions from ffprobe",
            ))
        }
    };

    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let frame_rate = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rational));

    Ok(MediaInfo {
        width,
        height,
        duration_secs,
        frame_count: video.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        frame_rate,
        has_audio: parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

fn parse_rational(raw: &str) -> Option<f64> {
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => raw.parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Decodes a video to raw `rgb24` frames over a pipe.
struct FfmpegDecoder {
    guard: ChildGuard,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    frame_len: usize,
    source: PathBuf,
}

impl FfmpegDecoder {
    fn spawn(ffmpeg: &Path, path: &Path, info: &MediaInfo) -> SubburnResult<Self> {
        let mut child = Command::new(ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SubburnError::render(RenderStage::Streaming, format!("Failed to start decoder: {e}"))
            })?;

        let stdout = child.stdout.take();
        let stderr_task = child.stderr.take().map(drain_stderr);
        tracing::debug!(pid = child.id(), source = %path.display(), "Decoder started");

        Ok(Self {
            guard: ChildGuard::new(child),
            stdout,
            stderr_task,
            frame_len: info.width as usize * info.height as usize * 3,
            source: path.to_path_buf(),
        })
    }

    fn finish_stream(&mut self) -> SubburnResult<()> {
        self.stdout.take();
        let Some(mut child) = self.guard.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| {
            SubburnError::render(RenderStage::Streaming, format!("Failed to wait on decoder: {e}"))
        })?;
        let stderr_output = join_stderr(self.stderr_task.take());
        if !status.success() {
            return Err(SubburnError::render(
                RenderStage::Streaming,
                format!(
                    "decoding {} failed ({status}): {}",
                    self.source.display(),
                    stderr_output.trim()
                ),
            ));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegDecoder {
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    fn next_frame(&mut self, frame: &mut RgbImage) -> SubburnResult<bool> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(false);
        };
        let buf: &mut [u8] = frame;
        if buf.len() != self.frame_len {
            return Err(SubburnError::render(
                RenderStage::Streaming,
                format!(
                    "frame buffer is {} bytes, decoder produces {}",
                    buf.len(),
                    self.frame_len
                ),
            ));
        }

        let mut filled = 0;
        while filled < buf.len() {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(SubburnError::render(
                        RenderStage::Streaming,
                        format!("Failed reading decoded frame: {e}"),
                    ))
                }
            }
        }

        if filled == 0 {
            self.finish_stream()?;
            return Ok(false);
        }
        if filled < buf.len() {
            return Err(SubburnError::render(
                RenderStage::Streaming,
                format!("decoder produced a truncated frame ({filled} of {} bytes)", buf.len()),
            ));
        }
        Ok(true)
    }
}

/// Encodes raw `rgb24` frames from a pipe into an H.264 file without audio.
struct FfmpegEncoder {
    guard: ChildGuard,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frame_len: usize,
}

impl FfmpegEncoder {
    fn spawn(
        tools: &ToolConfig,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> SubburnResult<Self> {
        let mut cmd = Command::new(&tools.ffmpeg);
        cmd.args(["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-framerate", &format!("{fps}")])
            .args(["-i", "pipe:0", "-an"])
            // yuv420p needs even dimensions
            .args(["-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2"])
            .args(video_codec_args(tools))
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            SubburnError::render(RenderStage::Encoding, format!("Failed to start encoder: {e}"))
        })?;
        let stdin = child.stdin.take();
        let stderr_task = child.stderr.take().map(drain_stderr);
        tracing::debug!(pid = child.id(), output = %path.display(), width, height, fps, "Encoder started");

        Ok(Self {
            guard: ChildGuard::new(child),
            stdin,
            stderr_task,
            frame_len: width as usize * height as usize * 3,
        })
    }

    fn fail_with_stderr(&mut self, context: String) -> SubburnError {
        self.stdin.take();
        if let Some(mut child) = self.guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let stderr_output = join_stderr(self.stderr_task.take());
        SubburnError::render(
            RenderStage::Encoding,
            format!("{context}: {}", stderr_output.trim()),
        )
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> SubburnResult<()> {
        if frame.as_raw().len() != self.frame_len {
            return Err(SubburnError::render(
                RenderStage::Encoding,
                format!(
                    "frame is {} bytes, encoder expects {}",
                    frame.as_raw().len(),
                    self.frame_len
                ),
            ));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SubburnError::render(RenderStage::Encoding, "encoder already finished"));
        };
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            return Err(self.fail_with_stderr(format!("Failed to write frame to encoder: {e}")));
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> SubburnResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.guard.take() else {
            return Err(SubburnError::render(RenderStage::Encoding, "encoder already finished"));
        };
        let status = child.wait().map_err(|e| {
            SubburnError::render(RenderStage::Encoding, format!("Failed to wait on encoder: {e}"))
        })?;
        let stderr_output = join_stderr(self.stderr_task.take());
        if !status.success() {
            return Err(SubburnError::render(
                RenderStage::Encoding,
                format!("encoder exited with {status}: {}", stderr_output.trim()),
            ));
        }
        Ok(())
    }
}
