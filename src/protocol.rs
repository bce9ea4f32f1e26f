//! Wire types shared by the sampler, the HTTP API and WebSocket viewers

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::constants::STOP_SENTINEL;

/// Raw point returned by a sample source, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePoint {
    pub x: f64,
    pub y: f64,
}

impl GazePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A timestamped gaze sample
///
/// Serialized as `{"x": .., "y": .., "timestamp": ..}` with the timestamp in
/// milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl GazeSample {
    pub fn new(x: f64, y: f64, timestamp_ms: i64) -> Self {
        Self { x, y, timestamp_ms }
    }

    /// Stamp a polled point
    pub fn from_point(point: GazePoint, timestamp_ms: i64) -> Self {
        Self::new(point.x, point.y, timestamp_ms)
    }

    pub fn point(&self) -> GazePoint {
        GazePoint::new(self.x, self.y)
    }
}

/// Named numeric tuning parameters
pub type Settings = BTreeMap<String, f64>;

/// Write settings with integral values as JSON integers (`7`, not `7.0`)
pub fn serialize_settings<S: Serializer>(
    settings: &Settings,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(settings.iter().map(|(key, value)| (key, SettingValue(*value))))
}

struct SettingValue(f64);

impl Serialize for SettingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // 2^53: beyond this not every integer is representable
        const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;

        let value = self.0;
        if value.fract() == 0.0 && value.abs() < EXACT_LIMIT {
            serializer.serialize_i64(value as i64)
        } else {
            serializer.serialize_f64(value)
        }
    }
}

/// Settings map as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsBody(#[serde(serialize_with = "serialize_settings")] pub Settings);

/// Lifecycle state of the tracking controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Idle,
    Running,
}

/// Outcome of a start/stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    Started,
    AlreadyTracking,
    Stopped,
}

impl TrackingStatus {
    /// Status string reported to HTTP clients
    pub fn message(&self) -> &'static str {
        match self {
            TrackingStatus::Started => "Tracking started",
            TrackingStatus::AlreadyTracking => "Already tracking",
            TrackingStatus::Stopped => "Tracking stopped",
        }
    }
}

/// `{"status": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

impl From<TrackingStatus> for StatusResponse {
    fn from(status: TrackingStatus) -> Self {
        Self::new(status.message())
    }
}

/// `{"status": "Error", "message": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "Error".to_string(),
            message: message.into(),
        }
    }
}

/// Reply to a successful settings update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub status: String,
    #[serde(serialize_with = "serialize_settings")]
    pub settings: Settings,
}

/// Reply to an asynchronous calibration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationStarted {
    pub status: String,
    pub calibration_id: uuid::Uuid,
}

/// Messages a viewer may send over its stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Close the stream gracefully
    Stop,
    /// Anything else; ignored
    Other(String),
}

impl ClientCommand {
    pub fn parse(text: &str) -> Self {
        if text.trim() == STOP_SENTINEL {
            ClientCommand::Stop
        } else {
            ClientCommand::Other(text.to_string())
        }
    }
}
