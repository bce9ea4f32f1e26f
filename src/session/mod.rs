//! Session recording: the sample buffer and its export sink

pub mod buffer;
pub mod export;

pub use buffer::{BufferStats, SessionBuffer, SharedSessionBuffer, SnapshotMark};
pub use export::{ExportedFile, SessionExporter};
