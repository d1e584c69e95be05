//! Configuration system for Bluem.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BLUEM_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/bluem/config.toml
//!   3. ~/.config/bluem/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::profile::Profile;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BluemConfig {
    pub radio: RadioConfig,
    pub tracking: TrackingConfig,
    pub profile: Profile,
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Network interface carrying the radio emulation. Empty = CLI argument.
    pub interface: String,
    /// UDP port advertisement frames are exchanged on.
    pub port: u16,
    /// How often the advertisement is re-encoded and sent.
    pub advertise_interval_ms: u64,
    /// Start advertising as soon as the daemon is up.
    pub advertise_on_start: bool,
    /// Name carried in outgoing frames, like a BLE local name.
    pub device_name: Option<String>,
    /// Signal strength reported for every received frame.
    pub simulated_rssi: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// A peer with no ping for this long is marked inactive.
    pub liveness_timeout_ms: u64,
    /// Period of the liveness sweep.
    pub sweep_interval_ms: u64,
    /// Minimum interval between update notifications for one peer.
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Port of the HTTP API on 127.0.0.1.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding user-assigned device names.
    pub names_path: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            port: 9100,
            advertise_interval_ms: 1000,
            advertise_on_start: false,
            device_name: None,
            simulated_rssi: -60,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_ms: 30_000,
            sweep_interval_ms: 5_000,
            debounce_ms: 2_000,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 9101 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            names_path: data_dir().join("names.json"),
        }
    }
}

impl TrackingConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Periodic timers cannot tick at a zero period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("tracking.sweep_interval_ms"));
        }
        Ok(())
    }
}

impl RadioConfig {
    pub fn advertise_interval(&self) -> Duration {
        Duration::from_millis(self.advertise_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.advertise_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("radio.advertise_interval_ms"));
        }
        Ok(())
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("bluem")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("bluem")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BluemConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BluemConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BLUEM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BluemConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BLUEM_* overrides. `lookup` is `std::env::var` outside tests.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BLUEM_RADIO__INTERFACE") {
            self.radio.interface = v;
        }
        if let Some(p) = lookup("BLUEM_RADIO__PORT").and_then(|v| v.parse().ok()) {
            self.radio.port = p;
        }
        if let Some(v) = lookup("BLUEM_RADIO__ADVERTISE_ON_START") {
            self.radio.advertise_on_start = v == "true" || v == "1";
        }
        if let Some(ms) = lookup("BLUEM_TRACKING__LIVENESS_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.tracking.liveness_timeout_ms = ms;
        }
        if let Some(ms) = lookup("BLUEM_TRACKING__DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.tracking.debounce_ms = ms;
        }
        if let Some(p) = lookup("BLUEM_API__PORT").and_then(|v| v.parse().ok()) {
            self.api.port = p;
        }
        if let Some(v) = lookup("BLUEM_PROFILE__PHONE_NUMBER") {
            self.profile.phone_number = v;
        }
        if let Some(index) = lookup("BLUEM_PROFILE__BLOOD_GROUP").and_then(|v| v.parse().ok()) {
            self.profile.blood_group = Some(index);
        }
    }
}
