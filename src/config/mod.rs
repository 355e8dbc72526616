//! Configuration module for LasecPlot
//!
//! This module handles application configuration including:
//! - Persistent settings (ports, serial device, frame rate) stored as TOML
//! - Environment overrides for the UDP ports
//! - Runtime settings changed while a session runs (see [`settings`])
//!
//! # App Data Location
//!
//! The default configuration file lives in the platform data directory:
//! - **Linux**: `~/.local/share/dev.lasecplot/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.lasecplot/config.toml`
//! - **Windows**: `%APPDATA%\dev.lasecplot\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use lasecplot::config::AppConfig;
//!
//! let mut config = AppConfig::load_or_default(AppConfig::default_path());
//! config.apply_env_overrides();
//! println!("listening on {}", config.ingest.udp_bind_address());
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{LasecPlotError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.lasecplot";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default telemetry UDP port
pub const DEFAULT_UDP_PORT: u16 = 47269;

/// Default remote command UDP port
pub const DEFAULT_CMD_UDP_PORT: u16 = 47268;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default render/flush rate in Hz
pub const DEFAULT_FRAME_RATE_HZ: u32 = 24;

/// Environment variable overriding [`IngestConfig::udp_port`]
pub const ENV_UDP_PORT: &str = "LASECPLOT_UDP_PORT";

/// Environment variable overriding [`IngestConfig::cmd_udp_port`]
pub const ENV_CMD_UDP_PORT: &str = "LASECPLOT_CMD_UDP_PORT";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        LasecPlotError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            LasecPlotError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

// ==================== App Config ====================

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Transport configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Tick and window configuration
    #[serde(default)]
    pub view: ViewConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location, falling back to the working directory
    pub fn default_path() -> PathBuf {
        app_data_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LasecPlotError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            LasecPlotError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load a configuration file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LasecPlotError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| LasecPlotError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| LasecPlotError::Config(format!("Failed to write config: {}", e)))
    }

    /// Apply the port overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply port overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_UDP_PORT).and_then(|v| parse_port(ENV_UDP_PORT, &v)) {
            self.ingest.udp_port = port;
        }
        if let Some(port) = lookup(ENV_CMD_UDP_PORT).and_then(|v| parse_port(ENV_CMD_UDP_PORT, &v)) {
            self.ingest.cmd_udp_port = port;
        }
    }
}

/// Valid ports are 1..=65535
fn parse_port(key: &str, value: &str) -> Option<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Some(port),
        _ => {
            tracing::warn!("Ignoring {}={:?}: not a valid port", key, value);
            None
        }
    }
}

// ==================== Ingest Config ====================

/// Where telemetry comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Local address the UDP listener binds to
    pub bind_address: String,

    /// Telemetry UDP port
    pub udp_port: u16,

    /// Remote command UDP port on the device
    pub cmd_udp_port: u16,

    /// Device host; when set, only its datagrams are accepted and commands
    /// are sent to it
    pub remote_address: Option<String>,

    /// Serial device path (e.g. `/dev/ttyUSB0`, `COM3`)
    pub serial_port: Option<String>,

    /// Serial baud rate
    pub baud_rate: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            udp_port: DEFAULT_UDP_PORT,
            cmd_udp_port: DEFAULT_CMD_UDP_PORT,
            remote_address: None,
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl IngestConfig {
    /// `address:port` for the UDP listener
    pub fn udp_bind_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.udp_port)
    }
}

// ==================== View Config ====================

/// Tick scheduling and retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Flush ticks per second
    pub frame_rate_hz: u32,

    /// Initial sliding window in seconds (0 keeps everything)
    pub view_duration_secs: f64,

    /// Interval between command-list requests in seconds
    pub command_refresh_secs: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
            view_duration_secs: 15.0,
            command_refresh_secs: 3.0,
        }
    }
}

impl ViewConfig {
    /// Tick period, clamped to at least one tick per second
    pub fn frame_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.frame_rate_hz.max(1) as f64)
    }
}

// ==================== Tests ====================
