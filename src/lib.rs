//! # Gaze Stream
//!
//! Real-time gaze sample broadcasting with session buffering and export.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                         TrackingController (tracking)                      │
//! │                                                                            │
//! │   Idle ──start──▶ Running ──stop──▶ Idle        (parking_lot::Mutex)      │
//! │                      │                                                     │
//! │                      ▼                                                     │
//! │  ┌──────────────────────────────────────────────────────────────────┐     │
//! │  │                 Sampler Thread ("gaze-sampler")                   │     │
//! │  │                                                                   │     │
//! │  │   poll() ──▶ stamp ──▶ SessionBuffer::append ──▶ broadcast        │     │
//! │  │      ▲                                              │             │     │
//! │  │      └──────────────── sleep 50 ms ◀────────────────┘             │     │
//! │  └──────┬───────────────────────┬──────────────────────┬────────────┘     │
//! └─────────┼───────────────────────┼──────────────────────┼──────────────────┘
//!           │                       │                      │
//!           ▼                       ▼                      ▼
//!  ┌─────────────────┐    ┌───────────────────┐   ┌──────────────────────────┐
//!  │  SampleSource   │    │   SessionBuffer   │   │   SubscriberRegistry     │
//!  │ (source)        │    │ (session)         │   │ (broadcast) DashMap      │
//!  │ start/poll/stop │    │ RwLock<VecDeque>  │   │  ┌──────┐ ┌──────┐       │
//!  └─────────────────┘    └─────────┬─────────┘   │  │ ws 0 │ │ ws 1 │ ...   │
//!                                   │             │  └──┬───┘ └──┬───┘       │
//!                                   ▼             └─────┼────────┼───────────┘
//!                         ┌───────────────────┐         ▼        ▼
//!                         │ /gaze-data        │     WebSocket writer tasks
//!                         │ /download-data    │       (ui::websocket)
//!                         └───────────────────┘
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod source;
pub mod tracking;
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Interval between two polls of the sample source in milliseconds (~20 Hz)
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

    /// Default HTTP/WebSocket port
    pub const DEFAULT_HTTP_PORT: u16 = 5000;

    /// Default bind address
    pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

    /// Default calibration duration in milliseconds
    pub const DEFAULT_CALIBRATION_MS: u64 = 5_000;

    /// Per-subscriber outbound queue depth (messages)
    pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 64;

    /// Session buffer bound: six hours at 20 Hz
    pub const DEFAULT_MAX_SESSION_SAMPLES: usize = 432_000;

    /// Initial `sensitivity` setting
    pub const DEFAULT_SENSITIVITY: f64 = 5.0;

    /// Initial `smoothing` setting
    pub const DEFAULT_SMOOTHING: f64 = 5.0;

    /// Text frame a viewer sends to close its stream
    pub const STOP_SENTINEL: &str = "STOP";

    /// Default export directory
    pub const DEFAULT_EXPORT_DIR: &str = "data";

    /// File name used for session exports
    pub const EXPORT_FILE_NAME: &str = "gaze_data.json";

    /// Frame size the simulated source draws gaze points in
    pub const FRAME_WIDTH: f64 = 640.0;
    pub const FRAME_HEIGHT: f64 = 480.0;
}
