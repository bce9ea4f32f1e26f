//! JSON export of a recorded session

use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::error::Result;
use crate::protocol::GazeSample;

/// Writes session snapshots to the export directory
#[derive(Debug, Clone)]
pub struct SessionExporter {
    directory: PathBuf,
    file_name: String,
}

/// A written export
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl SessionExporter {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.directory.clone(), config.file_name.clone())
    }

    /// Target path of the export file
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Serialize `samples` as a JSON array and write it to disk
    pub fn export(&self, samples: &[GazeSample]) -> Result<ExportedFile> {
        let bytes = serde_json::to_vec(samples)?;

        std::fs::create_dir_all(&self.directory)?;
        let path = self.path();
        std::fs::write(&path, &bytes)?;

        tracing::info!("Exported {} samples to {}", samples.len(), path.display());

        Ok(ExportedFile {
            path,
            file_name: self.file_name.clone(),
            bytes,
        })
    }

    /// Read back a previous export
    pub fn load(path: &Path) -> Result<Vec<GazeSample>> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
