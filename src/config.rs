//! Configuration persistence for snapbooth settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where local copies of captured and result images are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveLocation {
    #[default]
    Pictures,
    Documents,
}

impl SaveLocation {
    /// Resolve the folder, falling back to a folder under the home directory
    pub fn dir(self) -> Option<PathBuf> {
        match self {
            SaveLocation::Pictures => {
                dirs::picture_dir().or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
            }
            SaveLocation::Documents => {
                dirs::document_dir().or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
            }
        }
    }
}

/// Bounded exponential backoff for transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based), with jitter in [half, full]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let full = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        if full == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(fastrand::u64(full / 2..=full))
    }
}

/// Camera source settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// V4L2 device node
    pub device: String,
    /// Requested frame size (None = device default)
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Frames dropped after opening while exposure settles
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    /// How long to wait for a frame before giving up
    #[serde(default = "default_frame_timeout_secs")]
    pub frame_timeout_secs: u64,
}

fn default_warmup_frames() -> u32 {
    5
}

fn default_frame_timeout_secs() -> u64 {
    5
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: None,
            height: None,
            warmup_frames: default_warmup_frames(),
            frame_timeout_secs: default_frame_timeout_secs(),
        }
    }
}

/// Application configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    /// Base url of the gallery API
    pub api_endpoint: String,
    /// Seconds between readiness probes on the display screen
    pub poll_interval_secs: u64,
    /// Seconds between elapsed-time ticks on the display screen
    pub tick_interval_secs: u64,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub camera: CameraConfig,
    /// Whether visitors must agree before the camera is used
    #[serde(default = "default_consent_required")]
    pub consent_required: bool,
    /// Keep local copies of captured and result images (None = don't)
    #[serde(default)]
    pub save_location: Option<SaveLocation>,
}

fn default_consent_required() -> bool {
    true
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "http://localhost:3000".to_string(),
            poll_interval_secs: 5,
            tick_interval_secs: 1,
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
            camera: CameraConfig::default(),
            consent_required: default_consent_required(),
            save_location: None,
        }
    }
}

impl BoothConfig {
    /// Configuration directory name
    pub const ID: &'static str = "snapbooth";

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::ID).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            log::warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
