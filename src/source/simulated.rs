//! Synthetic gaze source
//!
//! Traces a Lissajous path across the frame with a small deterministic
//! jitter, and blinks periodically (empty polls). Lets the server run and be
//! demoed without tracker hardware.

use crate::constants::{DEFAULT_SENSITIVITY, DEFAULT_SMOOTHING, FRAME_HEIGHT, FRAME_WIDTH};
use crate::error::SourceError;
use crate::protocol::{GazePoint, Settings};
use crate::source::SampleSource;

/// Polls between blinks
const BLINK_PERIOD: u64 = 60;

/// Consecutive empty polls per blink
const BLINK_LENGTH: u64 = 3;

/// Phase advance per poll in radians
const PHASE_STEP: f64 = 0.05;

pub struct SimulatedSource {
    width: f64,
    height: f64,
    started: bool,
    tick: u64,

    /// Jitter amplitude in pixels per sensitivity unit
    sensitivity: f64,

    /// Exponential smoothing weight of the previous point, 0..1
    smoothing: f64,

    last: Option<GazePoint>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self::with_frame(FRAME_WIDTH, FRAME_HEIGHT)
    }

    pub fn with_frame(width: f64, height: f64) -> Self {
        let mut source = Self {
            width,
            height,
            started: false,
            tick: 0,
            sensitivity: 0.0,
            smoothing: 0.0,
            last: None,
        };
        source.set_sensitivity(DEFAULT_SENSITIVITY);
        source.set_smoothing(DEFAULT_SMOOTHING);
        source
    }

    fn set_sensitivity(&mut self, value: f64) {
        self.sensitivity = value.max(0.0);
    }

    /// Map the 0..10 `smoothing` scale onto an EMA weight
    fn set_smoothing(&mut self, value: f64) {
        self.smoothing = (value / 10.0).clamp(0.0, 0.95);
    }

    fn is_blinking(&self) -> bool {
        self.tick % BLINK_PERIOD >= BLINK_PERIOD - BLINK_LENGTH
    }

    fn raw_point(&self) -> GazePoint {
        let t = self.tick as f64 * PHASE_STEP;
        let cx = self.width / 2.0;
        let cy = self.height / 2.0;

        let jitter_x = (t * 12.9898).sin() * self.sensitivity * 0.5;
        let jitter_y = (t * 78.233).cos() * self.sensitivity * 0.5;

        GazePoint::new(
            (cx + cx * 0.8 * (3.0 * t).sin() + jitter_x).clamp(0.0, self.width),
            (cy + cy * 0.8 * (2.0 * t).sin() + jitter_y).clamp(0.0, self.height),
        )
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SimulatedSource {
    fn start(&mut self) -> Result<(), SourceError> {
        self.started = true;
        self.tick = 0;
        self.last = None;
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<GazePoint>, SourceError> {
        if !self.started {
            return Err(SourceError::NotStarted);
        }

        let blinking = self.is_blinking();
        let raw = self.raw_point();
        self.tick = self.tick.wrapping_add(1);

        if blinking {
            return Ok(None);
        }

        let point = match self.last {
            Some(prev) => GazePoint::new(
                prev.x * self.smoothing + raw.x * (1.0 - self.smoothing),
                prev.y * self.smoothing + raw.y * (1.0 - self.smoothing),
            ),
            None => raw,
        };
        self.last = Some(point);
        Ok(Some(point))
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.started = false;
        Ok(())
    }

    fn configure(&mut self, settings: &Settings) {
        if let Some(&value) = settings.get("sensitivity") {
            self.set_sensitivity(value);
        }
        if let Some(&value) = settings.get("smoothing") {
            self.set_smoothing(value);
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
