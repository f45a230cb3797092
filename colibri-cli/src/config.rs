//! Configuration file support for colibri.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (COLIBRI_*)
//! 3. Local config file (./colibri.toml)
//! 4. Global config file (~/.config/colibri/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "colibri.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyACM0" or "COM3").
    pub port: Option<String>,
    /// Frame commands with a CRC-16 checksum.
    pub use_checksum: Option<bool>,
    /// Response deadline in seconds; 0 waits forever.
    pub timeout_secs: Option<u64>,
}

/// Firmware update configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirmwareConfig {
    /// Seconds to wait for the module to restart after an update.
    pub settle_secs: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Firmware update configuration.
    #[serde(default)]
    pub firmware: FirmwareConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "colibri").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Response deadline; `Some(0)` maps to no deadline.
    pub fn response_timeout(&self) -> Option<Option<Duration>> {
        self.connection
            .timeout_secs
            .map(|secs| (secs > 0).then(|| Duration::from_secs(secs)))
    }

    /// Post-reset settle delay after a firmware update.
    pub fn settle_delay(&self) -> Option<Duration> {
        self.firmware
            .settle_secs
            .map(Duration::from_secs)
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.use_checksum.is_some() {
            self.connection.use_checksum = other.connection.use_checksum;
        }
        if other.connection.timeout_secs.is_some() {
            self.connection.timeout_secs = other.connection.timeout_secs;
        }
        if other.firmware.settle_secs.is_some() {
            self.firmware.settle_secs = other.firmware.settle_secs;
        }
    }
}
