//! Tracking lifecycle and calibration

pub mod calibration;
pub mod controller;

pub use calibration::{CalibrationHandle, CalibrationState, Calibrator};
pub use controller::{SamplerStats, TrackingController, TrackingSnapshot};
