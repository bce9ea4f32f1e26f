//! Gaze sample sources
//!
//! A source is the opaque tracker backend the controller drives: it is
//! started once per tracking session, polled at a fixed cadence from the
//! sampler thread, and stopped when the session ends.

pub mod replay;
pub mod simulated;

pub use replay::{ReplayCounters, ReplaySource, ReplayStep};
pub use simulated::SimulatedSource;

use crate::error::SourceError;
use crate::protocol::{GazePoint, Settings};

/// Provider of raw gaze points
pub trait SampleSource: Send {
    /// Begin capture
    fn start(&mut self) -> Result<(), SourceError>;

    /// Fetch the current gaze point, if one is available
    ///
    /// Must return quickly; `Ok(None)` is a normal outcome (no face, blink).
    fn poll(&mut self) -> Result<Option<GazePoint>, SourceError>;

    /// Release capture resources
    fn stop(&mut self) -> Result<(), SourceError>;

    /// Receive updated tuning parameters
    fn configure(&mut self, _settings: &Settings) {}

    /// Short name for logs
    fn name(&self) -> &str {
        "source"
    }
}

/// Boxed source shared between the controller and its sampler thread
pub type BoxedSource = Box<dyn SampleSource>;
