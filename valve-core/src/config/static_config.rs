//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the daemon starts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default baud rate of the valve firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[cfg(windows)]
const DEFAULT_DEVICE_PORT: &str = "COM5";
#[cfg(not(windows))]
const DEFAULT_DEVICE_PORT: &str = "/dev/ttyACM0";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub hostname: String,
    /// Listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Serial device configuration
///
/// The settle delays exist because opening the port resets the
/// microcontroller, and because replies trail the command by a few
/// milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port identifier (e.g. `/dev/ttyACM0`, `COM5`)
    pub port: String,
    /// Line speed
    pub baud_rate: u32,
    /// Wait after opening the port, before the first read
    pub connect_settle_ms: u64,
    /// Wait after writing a score, before draining replies
    pub response_settle_ms: u64,
    /// Wait after the final close command, before releasing the port
    pub close_settle_ms: u64,
    /// Upper bound for completing a partially received reply line,
    /// also used as the write timeout
    pub read_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DEVICE_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            connect_settle_ms: 2000,
            response_settle_ms: 100,
            close_settle_ms: 500,
            read_timeout_ms: 1000,
        }
    }
}

impl DeviceConfig {
    /// Device settings for `port` with default timing
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub fn response_settle(&self) -> Duration {
        Duration::from_millis(self.response_settle_ms)
    }

    pub fn close_settle(&self) -> Duration {
        Duration::from_millis(self.close_settle_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Static configuration for the valve controller daemon.
///
/// Located at `~/.config/valve-controller/config.toml` by default. Missing
/// sections and keys fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Serial device configuration
    pub device: DeviceConfig,
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
