//! Configuration file support for striplink.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (STRIPLINK_*)
//! 3. Local config file (./striplink.toml)
//! 4. Global config file (~/.config/striplink/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use striplink::{Capabilities, MonitorConfig};

/// Name of the local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "striplink.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
}

/// What this host announces in reply to `ENQ`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name.
    pub name: Option<String>,
    /// Feature tags.
    pub features: Option<Vec<String>>,
    /// Free-form properties.
    pub properties: Option<Vec<String>>,
}

/// Port monitor tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Reconnect after this many idle seconds; 0 disables the watchdog.
    pub idle_timeout_secs: Option<u64>,
    /// Health check interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
}

/// Where received frames go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// File overwritten with every received frame.
    pub path: Option<PathBuf>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Announced capabilities.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Monitor settings.
    #[serde(default)]
    pub monitor: MonitorSection,
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
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

    /// Load configuration from a specific file.
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
        ProjectDirs::from("", "", "striplink").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set values in `other` win.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }

        if other.device.name.is_some() {
            self.device.name = other.device.name;
        }
        if other.device.features.is_some() {
            self.device.features = other.device.features;
        }
        if other.device.properties.is_some() {
            self.device.properties = other.device.properties;
        }

        if other.monitor.idle_timeout_secs.is_some() {
            self.monitor.idle_timeout_secs = other.monitor.idle_timeout_secs;
        }
        if other.monitor.poll_interval_ms.is_some() {
            self.monitor.poll_interval_ms = other.monitor.poll_interval_ms;
        }

        if other.output.path.is_some() {
            self.output.path = other.output.path;
        }
    }

    /// Capabilities announced by `listen`; unset fields keep the defaults.
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::default();
        if let Some(name) = &self.device.name {
            caps.name.clone_from(name);
        }
        if let Some(features) = &self.device.features {
            caps.features.clone_from(features);
        }
        if let Some(properties) = &self.device.properties {
            caps.properties.clone_from(properties);
        }
        caps
    }

    /// Monitor settings with the configured overrides applied.
    pub fn monitor_config(&self) -> MonitorConfig {
        let mut monitor = MonitorConfig::default();
        if let Some(secs) = self.monitor.idle_timeout_secs {
            monitor.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ms) = self.monitor.poll_interval_ms {
            monitor.poll_interval = Duration::from_millis(ms.max(1));
        }
        monitor
    }
}
