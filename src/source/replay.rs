//! Scripted / recorded gaze source
//!
//! Replays a fixed sequence of poll outcomes, e.g. a previously exported
//! session. Call counters are shared through [`ReplayCounters`] so the
//! caller can observe how the controller drove the source.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, SourceError};
use crate::protocol::{GazePoint, Settings};
use crate::session::SessionExporter;
use crate::source::SampleSource;

/// One scripted poll outcome
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayStep {
    Sample(GazePoint),
    Empty,
    Error(String),
}

/// Shared call counters of a [`ReplaySource`]
#[derive(Debug, Default)]
pub struct ReplayCounters {
    starts: AtomicUsize,
    stops: AtomicUsize,
    polls: AtomicUsize,
    samples: AtomicUsize,
    configures: AtomicUsize,
}

impl ReplayCounters {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Polls that returned a point
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    pub fn configures(&self) -> usize {
        self.configures.load(Ordering::SeqCst)
    }
}

pub struct ReplaySource {
    steps: Vec<ReplayStep>,
    position: usize,
    looped: bool,
    fail_start: Option<String>,
    started: bool,
    counters: Arc<ReplayCounters>,
}

impl ReplaySource {
    pub fn new(steps: Vec<ReplayStep>) -> Self {
        Self {
            steps,
            position: 0,
            looped: false,
            fail_start: None,
            started: false,
            counters: Arc::new(ReplayCounters::default()),
        }
    }

    /// Replay the points of a recorded session
    pub fn from_points(points: impl IntoIterator<Item = GazePoint>) -> Self {
        Self::new(points.into_iter().map(ReplayStep::Sample).collect())
    }

    /// Replay a session exported to `path`
    pub fn from_export(path: &Path) -> Result<Self> {
        let samples = SessionExporter::load(path)?;
        Ok(Self::from_points(samples.iter().map(|s| s.point())))
    }

    /// Restart from the first step once the script runs out
    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    /// Make `start()` fail with `reason`
    pub fn failing_start(mut self, reason: impl Into<String>) -> Self {
        self.fail_start = Some(reason.into());
        self
    }

    pub fn counters(&self) -> Arc<ReplayCounters> {
        self.counters.clone()
    }

    fn next_step(&mut self) -> Option<ReplayStep> {
        if self.position >= self.steps.len() {
            if !self.looped || self.steps.is_empty() {
                return None;
            }
            self.position = 0;
        }

        let step = self.steps[self.position].clone();
        self.position += 1;
        Some(step)
    }
}

impl SampleSource for ReplaySource {
    fn start(&mut self) -> std::result::Result<(), SourceError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.fail_start {
            return Err(SourceError::StartFailed(reason.clone()));
        }

        self.started = true;
        self.position = 0;
        Ok(())
    }

    fn poll(&mut self) -> std::result::Result<Option<GazePoint>, SourceError> {
        if !self.started {
            return Err(SourceError::NotStarted);
        }
        self.counters.polls.fetch_add(1, Ordering::SeqCst);

        match self.next_step() {
            Some(ReplayStep::Sample(point)) => {
                self.counters.samples.fetch_add(1, Ordering::SeqCst);
                Ok(Some(point))
            }
            Some(ReplayStep::Error(reason)) => Err(SourceError::PollFailed(reason)),
            Some(ReplayStep::Empty) | None => Ok(None),
        }
    }

    fn stop(&mut self) -> std::result::Result<(), SourceError> {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        self.started = false;
        Ok(())
    }

    fn configure(&mut self, _settings: &Settings) {
        self.counters.configures.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_script_then_runs_dry() {
        let mut source = ReplaySource::new(vec![
            ReplayStep::Sample(GazePoint::new(1.0, 1.0)),
            ReplayStep::Empty,
            ReplayStep::Error("lost face".into()),
        ]);
        source.start().unwrap();

        assert_eq!(source.poll().unwrap(), Some(GazePoint::new(1.0, 1.0)));
        assert_eq!(source.poll().unwrap(), None);
        assert!(matches!(source.poll(), Err(SourceError::PollFailed(_))));
        assert_eq!(source.poll().unwrap(), None);

        let counters = source.counters();
        assert_eq!(counters.polls(), 4);
        assert_eq!(counters.samples(), 1);
    }

    #[test]
    fn test_looped_replay() {
        let mut source = ReplaySource::from_points([GazePoint::new(1.0, 2.0)]).looped();
        source.start().unwrap();

        for _ in 0..5 {
            assert!(source.poll().unwrap().is_some());
        }
        assert_eq!(source.counters().samples(), 5);
    }

    #[test]
    fn test_failing_start() {
        let mut source = ReplaySource::new(vec![]).failing_start("camera busy");
        assert!(matches!(source.start(), Err(SourceError::StartFailed(_))));
        assert!(matches!(source.poll(), Err(SourceError::NotStarted)));
        assert_eq!(source.counters().starts(), 1);
    }

    #[test]
    fn test_from_export() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SessionExporter::new(dir.path(), "session.json");
        let exported = exporter
            .export(&[
                crate::protocol::GazeSample::new(10.0, 20.0, 1),
                crate::protocol::GazeSample::new(30.0, 40.0, 2),
            ])
            .unwrap();

        let mut source = ReplaySource::from_export(&exported.path).unwrap();
        source.start().unwrap();
        assert_eq!(source.poll().unwrap(), Some(GazePoint::new(10.0, 20.0)));
        assert_eq!(source.poll().unwrap(), Some(GazePoint::new(30.0, 40.0)));
        assert_eq!(source.poll().unwrap(), None);
    }
}
