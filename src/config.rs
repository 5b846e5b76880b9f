//! Runtime configuration assembly so config-file values and CLI flags resolve
//! consistently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default transcription endpoint when nothing is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/api/transcribe";

/// Settle delay between a merged transcript and its auto-submission.
pub const DEFAULT_AUTO_SUBMIT_DELAY_MS: u64 = 150;

/// Resolved application configuration.
///
/// File values load first; the binary layers CLI/env overrides on top, so a
/// flag always wins over the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Transcription endpoint URL.
    pub endpoint: String,
    /// Ask the server to strip timestamps, and run the local cleanup pass.
    pub strip_timestamps: bool,
    /// Submit the composed message automatically after a merged transcript.
    pub auto_submit: bool,
    /// Delay before auto-submission fires, in milliseconds.
    pub auto_submit_delay_ms: u64,
    /// Overall deadline for one transcription request, in seconds.
    pub request_timeout_secs: u64,
    /// Connect deadline for the transcription request, in seconds.
    pub connect_timeout_secs: u64,
    /// Preferred input device name; `None` uses the system default.
    pub input_device: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            strip_timestamps: true,
            auto_submit: false,
            auto_submit_delay_ms: DEFAULT_AUTO_SUBMIT_DELAY_MS,
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            input_device: None,
        }
    }
}

impl AppConfig {
    /// Default config-file location (`<config dir>/voxinput/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxinput").join("config.toml"))
    }

    /// Load from an explicit file. A missing file is not an error; it just
    /// yields the defaults so first runs work without any setup.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn auto_submit_delay(&self) -> Duration {
        Duration::from_millis(self.auto_submit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
