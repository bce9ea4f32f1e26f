//! Application configuration
//!
//! Every field has a default, so an empty or missing `config.toml` yields a
//! working setup. Lookup order for the file is: explicit path, then
//! `$GAZE_STREAM_CONFIG`, then the platform config directory.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::protocol::Settings;

/// Environment variable pointing at a config file
pub const CONFIG_ENV_VAR: &str = "GAZE_STREAM_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tracking: TrackingConfig,
    pub settings: SettingsConfig,
    pub calibration: CalibrationConfig,
    pub export: ExportConfig,
}

/// HTTP / WebSocket server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub http_port: u16,

    /// Allowed CORS origins; `"*"` allows any
    pub cors_allowed_origins: Vec<String>,

    /// Directory served for everything outside the API
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            cors_allowed_origins: vec!["*".to_string()],
            static_dir: Some(PathBuf::from("static")),
        }
    }
}

/// Sampling loop and buffering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub poll_interval_ms: u64,

    /// Upper bound on buffered samples; `None` grows without limit
    pub max_session_samples: Option<usize>,

    /// Outbound queue depth per viewer before it is dropped as too slow
    pub subscriber_queue: usize,

    /// Clear the session buffer whenever tracking starts
    pub reset_on_start: bool,
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_session_samples: Some(DEFAULT_MAX_SESSION_SAMPLES),
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
            reset_on_start: false,
        }
    }
}

/// Tuning parameter defaults and whitelist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub initial: Settings,

    /// Keys accepted by updates; empty accepts any key
    pub allowed_keys: Vec<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        let mut initial = Settings::new();
        initial.insert("sensitivity".to_string(), DEFAULT_SENSITIVITY);
        initial.insert("smoothing".to_string(), DEFAULT_SMOOTHING);

        Self {
            allowed_keys: initial.keys().cloned().collect(),
            initial,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub duration_ms: u64,
}

impl CalibrationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_CALIBRATION_MS,
        }
    }
}

/// Session export sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
    pub file_name: String,

    /// Clear the session buffer after a successful download
    pub clear_after_download: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_EXPORT_DIR),
            file_name: EXPORT_FILE_NAME.to_string(),
            clear_after_download: false,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Resolve the config file and load it, falling back to defaults when
    /// no file exists
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR)
                .map(PathBuf::from)
                .or_else(Self::default_path),
        };

        match path {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            Some(path) if explicit.is_some() => Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            ))),
            _ => Ok(Self::default()),
        }
    }

    /// Platform config location, e.g. `~/.config/gaze-stream/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gaze-stream").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Write as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracking.poll_interval_ms == 0 {
            return Err(Error::Config("tracking.poll_interval_ms must be > 0".into()));
        }
        if self.tracking.subscriber_queue == 0 {
            return Err(Error::Config("tracking.subscriber_queue must be > 0".into()));
        }
        if self.tracking.max_session_samples == Some(0) {
            return Err(Error::Config("tracking.max_session_samples must be > 0".into()));
        }
        if self.export.file_name.is_empty() {
            return Err(Error::Config("export.file_name must not be empty".into()));
        }
        Ok(())
    }
}
