//! Clock and timing utilities for frame-accurate caption timing.
//!
//! Caption visibility is decided in decode order, so every frame index maps
//! to a presentation time through the caller-supplied frame rate. This module
//! provides:
//! - Frame index <-> seconds conversion
//! - Coarse progress ticking for long frame loops
//! - A wall clock for render reports

use std::time::Instant;

use crate::error::{SubburnError, SubburnResult};

/// Maps frame indices to presentation times at a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Create a clock, rejecting non-finite or non-positive rates.
    pub fn new(fps: f64) -> SubburnResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(SubburnError::invalid_input(format!(
                "fps must be a positive number, got {fps}"
            )));
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Presentation time of a frame: `frame_index / fps`.
    pub fn time_at(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.fps
    }

    /// Index of the frame being shown at `secs` (floor).
    pub fn frame_at(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.fps).floor() as u64
    }

    /// Duration of one frame in seconds.
    pub fn frame_period(&self) -> f64 {
        1.0 / self.fps
    }

    /// Number of frames needed to cover `duration_secs`.
    pub fn frames_in(&self, duration_secs: f64) -> u64 {
        (duration_secs.max(0.0) * self.fps).ceil() as u64
    }
}

/// Fires once every `interval` frames for progress logging.
#[derive(Debug)]
pub struct ProgressTicker {
    interval: u64,
    last_tick: Option<u64>,
}

impl ProgressTicker {
    /// Create a ticker firing every `interval` frames (0 is treated as 1).
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            last_tick: None,
        }
    }

    /// Check whether `frames_done` crossed the next interval boundary.
    /// Returns true and updates internal state if so.
    pub fn should_tick(&mut self, frames_done: u64) -> bool {
        if frames_done == 0 || frames_done % self.interval != 0 {
            return false;
        }
        match self.last_tick {
            Some(last) if last == frames_done => false,
            _ => {
                self.last_tick = Some(frames_done);
                true
            }
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }
}

/// Wall and monotonic clock anchored at the start of a render.
#[derive(Debug, Clone)]
pub struct RenderClock {
    /// The instant the render started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RenderClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the render started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at render start.
    pub fn started_at(&self) -> &str {
        &self.epoch_wall
    }
}
