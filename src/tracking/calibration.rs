//! Fixed-duration calibration jobs
//!
//! A calibration runs on the async runtime and is observed through a
//! `watch` channel, so callers either get a handle back immediately or await
//! completion without tying up a worker thread.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Calibrator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CalibrationState {
    Idle,
    Running {
        id: Uuid,
        started_at: DateTime<Utc>,
    },
    Completed {
        id: Uuid,
        completed_at: DateTime<Utc>,
    },
}

impl CalibrationState {
    pub fn is_running(&self) -> bool {
        matches!(self, CalibrationState::Running { .. })
    }
}

/// Runs at most one calibration at a time
#[derive(Clone)]
pub struct Calibrator {
    duration: Duration,
    state: Arc<watch::Sender<CalibrationState>>,
}

impl Calibrator {
    pub fn new(duration: Duration) -> Self {
        let (state, _) = watch::channel(CalibrationState::Idle);
        Self {
            duration,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state.borrow().clone()
    }

    /// Start a calibration, or join the one already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin(&self) -> CalibrationHandle {
        let candidate = Uuid::new_v4();
        let mut id = candidate;

        self.state.send_if_modified(|state| match state {
            CalibrationState::Running { id: running, .. } => {
                id = *running;
                false
            }
            _ => {
                *state = CalibrationState::Running {
                    id: candidate,
                    started_at: Utc::now(),
                };
                true
            }
        });

        if id == candidate {
            tracing::info!("Calibration {} started", id);
            self.spawn_job(id);
        }

        CalibrationHandle {
            id,
            rx: self.state.subscribe(),
        }
    }

    fn spawn_job(&self, id: Uuid) {
        let state = self.state.clone();
        let duration = self.duration;

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;

            state.send_if_modified(|current| match current {
                CalibrationState::Running { id: running, .. } if *running == id => {
                    *current = CalibrationState::Completed {
                        id,
                        completed_at: Utc::now(),
                    };
                    true
                }
                _ => false,
            });
            tracing::info!("Calibration {} completed", id);
        });
    }
}

/// Handle on one calibration job
pub struct CalibrationHandle {
    id: Uuid,
    rx: watch::Receiver<CalibrationState>,
}

impl CalibrationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait until this job has completed
    pub async fn wait(mut self) -> CalibrationState {
        loop {
            {
                let state = self.rx.borrow_and_update();
                match &*state {
                    CalibrationState::Completed { id, .. } if *id == self.id => return state.clone(),
                    CalibrationState::Running { id, .. } if *id == self.id => {}
                    // Superseded by a newer job
                    CalibrationState::Running { .. } | CalibrationState::Completed { .. } => {
                        return state.clone()
                    }
                    CalibrationState::Idle => {}
                }
            }

            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}
