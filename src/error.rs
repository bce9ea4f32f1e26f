//! Error types for the gaze streaming service

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sample source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to start source: {0}")]
    StartFailed(String),

    #[error("Failed to stop source: {0}")]
    StopFailed(String),

    #[error("Poll failed: {0}")]
    PollFailed(String),

    #[error("Source is not started")]
    NotStarted,

    #[error("Sampler thread could not be spawned: {0}")]
    Spawn(String),
}

/// Subscriber push errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Subscriber closed")]
    Closed,

    #[error("Subscriber queue full")]
    QueueFull,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Settings payload errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Malformed JSON: {0}")]
    Malformed(String),

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Value for '{0}' is not a number")]
    NotNumeric(String),

    #[error("Value for '{0}' is not finite")]
    NotFinite(String),

    #[error("Unknown setting: {0}")]
    UnknownKey(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
