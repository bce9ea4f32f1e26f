//! Tracking lifecycle and the sampling loop
//!
//! `Idle --start--> Running --stop--> Idle`. Start and stop are atomic under
//! the state lock and idempotent. Each Running period owns one sampler
//! thread, which polls the source at a fixed interval, appends to the session
//! buffer and broadcasts to subscribers. Stop only lowers the session's
//! `active` flag; the sampler notices it at the top of its next iteration and
//! calls the source's `stop()` on its way out.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::broadcast::{RegistryStats, SubscriberRegistry};
use crate::config::TrackingConfig;
use crate::error::{Result, SourceError};
use crate::protocol::{GazeSample, Settings, TrackingState, TrackingStatus};
use crate::session::{BufferStats, SessionBuffer, SharedSessionBuffer};
use crate::source::{BoxedSource, SampleSource};

/// Owner of the tracking session
pub struct TrackingController {
    /// Current sampler; held across start and teardown
    inner: Mutex<ControllerInner>,

    /// Lifecycle state, written under `inner` and readable without it
    running: AtomicBool,

    /// Tracker backend, shared with the sampler thread
    source: Arc<Mutex<BoxedSource>>,
    source_name: String,

    buffer: SharedSessionBuffer,
    registry: Arc<SubscriberRegistry>,

    poll_interval: Duration,
    reset_on_start: bool,

    stats: Arc<SamplerCounters>,
}

struct ControllerInner {
    session: Option<SamplerSession>,
}

/// Handle on one Running period's sampler thread
struct SamplerSession {
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SamplerSession {
    fn join(self) {
        self.active.store(false, Ordering::Release);
        if self.handle.join().is_err() {
            tracing::error!("Sampler thread panicked");
        }
    }
}

impl TrackingController {
    /// Create a controller over existing buffer and registry handles
    pub fn new(
        source: BoxedSource,
        buffer: SharedSessionBuffer,
        registry: Arc<SubscriberRegistry>,
        config: &TrackingConfig,
    ) -> Self {
        let source_name = source.name().to_string();
        Self {
            inner: Mutex::new(ControllerInner { session: None }),
            running: AtomicBool::new(false),
            source: Arc::new(Mutex::new(source)),
            source_name,
            buffer,
            registry,
            poll_interval: config.poll_interval(),
            reset_on_start: config.reset_on_start,
            stats: Arc::new(SamplerCounters::default()),
        }
    }

    /// Create a controller with a fresh buffer sized from `config`
    pub fn from_config(source: impl SampleSource + 'static, config: &TrackingConfig) -> Self {
        Self::new(
            Box::new(source),
            Arc::new(SessionBuffer::with_capacity(config.max_session_samples)),
            Arc::new(SubscriberRegistry::new()),
            config,
        )
    }

    /// Start tracking
    ///
    /// Returns `AlreadyTracking` without side effects when running. If the
    /// source fails to start the controller stays idle and the error is
    /// returned.
    pub fn start(&self) -> Result<TrackingStatus> {
        let mut inner = self.inner.lock();
        if self.running.load(Ordering::Acquire) {
            return Ok(TrackingStatus::AlreadyTracking);
        }

        // A sampler from the previous period may still be inside its last
        // iteration; its stop() has to land before the source restarts.
        if let Some(previous) = inner.session.take() {
            previous.join();
        }

        if self.reset_on_start {
            self.buffer.clear();
        }

        self.source.lock().start()?;

        let active = Arc::new(AtomicBool::new(true));
        let sampler = Sampler {
            active: active.clone(),
            source: self.source.clone(),
            buffer: self.buffer.clone(),
            registry: self.registry.clone(),
            interval: self.poll_interval,
            stats: self.stats.clone(),
        };

        let handle = match thread::Builder::new()
            .name("gaze-sampler".to_string())
            .spawn(move || sampler.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(stop_err) = self.source.lock().stop() {
                    tracing::error!("Failed to stop {} source: {}", self.source_name, stop_err);
                }
                return Err(SourceError::Spawn(e.to_string()).into());
            }
        };

        self.running.store(true, Ordering::Release);
        inner.session = Some(SamplerSession { active, handle });
        self.stats.sessions.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            "Tracking started ({} source, {} ms interval)",
            self.source_name,
            self.poll_interval.as_millis()
        );
        Ok(TrackingStatus::Started)
    }

    /// Stop tracking
    ///
    /// Returns immediately; the sampler tears the source down within one
    /// poll interval. Stopping while idle is a no-op.
    pub fn stop(&self) -> Result<TrackingStatus> {
        let inner = self.inner.lock();
        if self.running.swap(false, Ordering::AcqRel) {
            if let Some(session) = &inner.session {
                session.active.store(false, Ordering::Release);
            }
            tracing::info!("Tracking stop requested");
        }
        Ok(TrackingStatus::Stopped)
    }

    /// Block until the sampler of a stopped session has exited
    ///
    /// Returns at once while running or when no sampler is left.
    pub fn wait_stopped(&self) {
        let mut inner = self.inner.lock();
        if self.running.load(Ordering::Acquire) {
            return;
        }
        if let Some(session) = inner.session.take() {
            session.join();
        }
    }

    /// Stop and wait for the source to be released
    pub fn shutdown(&self) {
        // stop() cannot fail
        let _ = self.stop();
        self.wait_stopped();
    }

    /// Forward tuning parameters to the source
    pub fn apply_settings(&self, settings: &Settings) {
        self.source.lock().configure(settings);
        tracing::debug!("Applied settings to {} source", self.source_name);
    }

    /// Never waits on a start or stop in progress
    pub fn state(&self) -> TrackingState {
        if self.is_running() {
            TrackingState::Running
        } else {
            TrackingState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ordered copy of the session so far
    pub fn snapshot(&self) -> Vec<GazeSample> {
        self.buffer.snapshot()
    }

    pub fn buffer(&self) -> &SharedSessionBuffer {
        &self.buffer
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn status(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            state: self.state(),
            source: self.source_name.clone(),
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            buffer: self.buffer.stats(),
            subscribers: self.registry.stats(),
            sampler: self.stats.snapshot(),
        }
    }
}

impl Drop for TrackingController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The sampling loop of one Running period
struct Sampler {
    active: Arc<AtomicBool>,
    source: Arc<Mutex<BoxedSource>>,
    buffer: SharedSessionBuffer,
    registry: Arc<SubscriberRegistry>,
    interval: Duration,
    stats: Arc<SamplerCounters>,
}

impl Sampler {
    fn run(self) {
        tracing::info!("Eye tracking started");

        // Continue from whatever the buffer already holds
        let mut last_timestamp = self
            .buffer
            .latest()
            .map_or(i64::MIN, |sample| sample.timestamp_ms);
        let mut consecutive_errors = 0u64;

        while self.active.load(Ordering::Acquire) {
            // Source lock is released before the sample is handled
            let polled = self.source.lock().poll();
            self.stats.polls.fetch_add(1, Ordering::Relaxed);

            match polled {
                Ok(Some(point)) => {
                    // Wall clock may step backwards; timestamps may not
                    let timestamp = Utc::now().timestamp_millis().max(last_timestamp);
                    last_timestamp = timestamp;

                    let sample = GazeSample::from_point(point, timestamp);
                    self.buffer.append(sample);
                    self.registry.broadcast(&sample);

                    self.stats.samples.fetch_add(1, Ordering::Relaxed);
                    consecutive_errors = 0;
                }
                Ok(None) => {
                    self.stats.empty_polls.fetch_add(1, Ordering::Relaxed);
                    consecutive_errors = 0;
                }
                Err(e) => {
                    self.stats.poll_errors.fetch_add(1, Ordering::Relaxed);
                    if consecutive_errors == 0 {
                        tracing::warn!("Gaze poll failed: {}", e);
                    } else {
                        tracing::debug!("Gaze poll failed ({} in a row): {}", consecutive_errors + 1, e);
                    }
                    consecutive_errors += 1;
                }
            }

            thread::sleep(self.interval);
        }

        if let Err(e) = self.source.lock().stop() {
            tracing::error!("Failed to stop source: {}", e);
        }
        tracing::info!("Eye tracking stopped");
    }
}

#[derive(Default)]
struct SamplerCounters {
    sessions: AtomicU64,
    polls: AtomicU64,
    samples: AtomicU64,
    empty_polls: AtomicU64,
    poll_errors: AtomicU64,
}

impl SamplerCounters {
    fn snapshot(&self) -> SamplerStats {
        SamplerStats {
            sessions: self.sessions.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
        }
    }
}

/// Sampler counters since process start
#[derive(Debug, Clone, serde::Serialize)]
pub struct SamplerStats {
    pub sessions: u64,
    pub polls: u64,
    pub samples: u64,
    pub empty_polls: u64,
    pub poll_errors: u64,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackingSnapshot {
    pub state: TrackingState,
    pub source: String,
    pub poll_interval_ms: u64,
    pub buffer: BufferStats,
    pub subscribers: RegistryStats,
    pub sampler: SamplerStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{ChannelSubscriber, Subscriber};
    use crate::error::Error;
    use crate::protocol::GazePoint;
    use crate::source::{ReplayCounters, ReplaySource, ReplayStep};
    use std::time::Instant;

    fn fast_config() -> TrackingConfig {
        TrackingConfig {
            poll_interval_ms: 5,
            ..TrackingConfig::default()
        }
    }

    fn controller(source: ReplaySource) -> (TrackingController, Arc<ReplayCounters>) {
        let counters = source.counters();
        (TrackingController::from_config(source, &fast_config()), counters)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn points(n: usize) -> Vec<GazePoint> {
        (0..n).map(|i| GazePoint::new(i as f64, i as f64 * 2.0)).collect()
    }

    #[test]
    fn test_start_is_idempotent() {
        let (controller, counters) = controller(ReplaySource::from_points(points(3)).looped());

        assert_eq!(controller.start().unwrap(), TrackingStatus::Started);
        assert_eq!(controller.start().unwrap(), TrackingStatus::AlreadyTracking);
        assert_eq!(controller.start().unwrap(), TrackingStatus::AlreadyTracking);

        assert_eq!(counters.starts(), 1);
        assert_eq!(controller.status().sampler.sessions, 1);
        controller.shutdown();
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (controller, counters) = controller(ReplaySource::new(vec![]));

        assert_eq!(controller.stop().unwrap(), TrackingStatus::Stopped);
        assert_eq!(controller.stop().unwrap(), TrackingStatus::Stopped);
        controller.wait_stopped();

        assert_eq!(counters.stops(), 0);
        assert_eq!(controller.state(), TrackingState::Idle);
    }

    #[test]
    fn test_repeated_stop_stops_source_once() {
        let (controller, counters) = controller(ReplaySource::from_points(points(3)).looped());

        controller.start().unwrap();
        wait_until(|| counters.polls() > 0);

        for _ in 0..3 {
            assert_eq!(controller.stop().unwrap(), TrackingStatus::Stopped);
        }
        controller.wait_stopped();

        assert_eq!(counters.stops(), 1);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_before_first_iteration_still_stops_source() {
        let (controller, counters) = controller(ReplaySource::from_points(points(1)));

        controller.start().unwrap();
        controller.stop().unwrap();
        controller.wait_stopped();

        assert_eq!(counters.starts(), 1);
        assert_eq!(counters.stops(), 1);
    }

    #[test]
    fn test_samples_buffered_in_poll_order() {
        let (controller, counters) = controller(ReplaySource::from_points(points(20)));

        controller.start().unwrap();
        wait_until(|| counters.samples() == 20);
        controller.shutdown();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.len(), 20);
        for (i, sample) in snapshot.iter().enumerate() {
            assert_eq!(sample.x, i as f64);
        }
        assert!(snapshot
            .windows(2)
            .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }

    #[test]
    fn test_poll_errors_and_gaps_are_skipped() {
        let (controller, counters) = controller(ReplaySource::new(vec![
            ReplayStep::Sample(GazePoint::new(1.0, 1.0)),
            ReplayStep::Error("face lost".into()),
            ReplayStep::Empty,
            ReplayStep::Sample(GazePoint::new(2.0, 2.0)),
        ]));

        controller.start().unwrap();
        wait_until(|| counters.polls() >= 5);
        controller.shutdown();

        let xs: Vec<f64> = controller.snapshot().iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![1.0, 2.0]);

        let stats = controller.status().sampler;
        assert_eq!(stats.poll_errors, 1);
        assert!(stats.empty_polls >= 1);
        assert_eq!(stats.samples, 2);
    }

    #[test]
    fn test_failed_source_start_stays_idle() {
        let (controller, counters) =
            controller(ReplaySource::new(vec![]).failing_start("camera busy"));

        let err = controller.start().unwrap_err();
        assert!(matches!(err, Error::Source(SourceError::StartFailed(_))));
        assert_eq!(controller.state(), TrackingState::Idle);
        assert_eq!(controller.status().sampler.sessions, 0);

        controller.shutdown();
        assert_eq!(counters.stops(), 0);
    }

    #[test]
    fn test_samples_broadcast_in_buffer_order() {
        let (controller, counters) = controller(ReplaySource::from_points(points(10)));
        let (viewer, mut rx) = ChannelSubscriber::new("viewer", 64);
        controller.registry().add(Arc::new(viewer));

        controller.start().unwrap();
        wait_until(|| counters.samples() == 10);
        controller.shutdown();

        let mut received = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            received.push(serde_json::from_str::<GazeSample>(&payload).unwrap());
        }
        assert_eq!(received, controller.snapshot());
    }

    #[test]
    fn test_failing_viewer_does_not_stop_sampling() {
        let (controller, counters) = controller(ReplaySource::from_points(points(10)));
        let (healthy, mut healthy_rx) = ChannelSubscriber::new("healthy", 64);
        let (gone, gone_rx) = ChannelSubscriber::new("gone", 64);
        let gone_id = gone.id();
        drop(gone_rx);
        controller.registry().add(Arc::new(healthy));
        controller.registry().add(Arc::new(gone));

        controller.start().unwrap();
        wait_until(|| counters.samples() == 10);
        controller.shutdown();

        assert!(!controller.registry().contains(gone_id));
        let mut delivered = 0;
        while healthy_rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, 10);
        assert_eq!(controller.buffer().len(), 10);
    }

    #[test]
    fn test_restart_runs_new_session_after_old_teardown() {
        let (controller, counters) = controller(ReplaySource::from_points(points(2)).looped());

        controller.start().unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.start().unwrap(), TrackingStatus::Started);

        assert_eq!(counters.starts(), 2);
        assert_eq!(counters.stops(), 1);
        assert!(controller.is_running());

        controller.shutdown();
        assert_eq!(counters.stops(), 2);
    }

    #[test]
    fn test_reset_on_start_clears_previous_session() {
        let source = ReplaySource::from_points(points(3));
        let counters = source.counters();
        let config = TrackingConfig {
            reset_on_start: true,
            ..fast_config()
        };
        let controller = TrackingController::from_config(source, &config);

        controller.start().unwrap();
        wait_until(|| counters.samples() == 3);
        controller.shutdown();
        assert_eq!(controller.buffer().len(), 3);

        controller.start().unwrap();
        wait_until(|| counters.samples() == 6);
        controller.shutdown();
        assert_eq!(controller.buffer().len(), 3);
    }

    #[test]
    fn test_timestamps_continue_from_buffered_samples() {
        let (controller, counters) = controller(ReplaySource::from_points(points(2)));
        let ahead = Utc::now().timestamp_millis() + 10_000;
        controller.buffer().append(GazeSample::new(0.0, 0.0, ahead));

        controller.start().unwrap();
        wait_until(|| counters.samples() == 2);
        controller.shutdown();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot
            .windows(2)
            .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
        assert!(snapshot.iter().all(|s| s.timestamp_ms >= ahead));
    }

    /// Source whose `start` blocks until released
    struct GatedSource {
        entered: Arc<AtomicBool>,
        release: std::sync::mpsc::Receiver<()>,
    }

    impl SampleSource for GatedSource {
        fn start(&mut self) -> std::result::Result<(), SourceError> {
            self.entered.store(true, Ordering::Release);
            let _ = self.release.recv();
            Ok(())
        }

        fn poll(&mut self) -> std::result::Result<Option<GazePoint>, SourceError> {
            Ok(None)
        }

        fn stop(&mut self) -> std::result::Result<(), SourceError> {
            Ok(())
        }
    }

    #[test]
    fn test_state_readable_during_slow_start() {
        let entered = Arc::new(AtomicBool::new(false));
        let (release, gate) = std::sync::mpsc::channel();
        let controller = Arc::new(TrackingController::from_config(
            GatedSource {
                entered: entered.clone(),
                release: gate,
            },
            &fast_config(),
        ));

        let starter = {
            let controller = controller.clone();
            thread::spawn(move || controller.start())
        };
        wait_until(|| entered.load(Ordering::Acquire));

        let (tx, rx) = std::sync::mpsc::channel();
        {
            let controller = controller.clone();
            thread::spawn(move || {
                let _ = tx.send(controller.status().state);
            });
        }
        let observed = rx.recv_timeout(Duration::from_secs(1));

        release.send(()).unwrap();
        assert_eq!(starter.join().unwrap().unwrap(), TrackingStatus::Started);
        assert_eq!(observed, Ok(TrackingState::Idle));
        assert!(controller.is_running());
        controller.shutdown();
    }

    #[test]
    fn test_apply_settings_reaches_source() {
        let (controller, counters) = controller(ReplaySource::new(vec![]));
        controller.apply_settings(&Settings::new());
        assert_eq!(counters.configures(), 1);
    }

    #[test]
    fn test_drop_releases_source() {
        let (controller, counters) = controller(ReplaySource::from_points(points(2)).looped());
        controller.start().unwrap();
        drop(controller);

        assert_eq!(counters.stops(), 1);
    }
}
