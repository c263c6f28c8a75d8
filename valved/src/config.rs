//! Configuration loading for the daemon
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file,
//! environment variables, command-line flags (applied in `main`).

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use valve_core::StaticConfig;

/// Environment variable overriding the serial port
pub const ENV_SERIAL_PORT: &str = "VALVE_SERIAL_PORT";

/// Environment variable overriding the baud rate
pub const ENV_BAUD_RATE: &str = "VALVE_BAUD_RATE";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Load the static configuration.
///
/// A missing file is not an error: the daemon runs on defaults so it can be
/// started with nothing but `--device`.
pub async fn load(path: &Path) -> Result<StaticConfig, ConfigError> {
    debug!("Loading configuration from: {}", path.display());

    if !fs::try_exists(path).await.unwrap_or(false) {
        info!(
            "Configuration file not found: {}. Using defaults.",
            path.display()
        );
        return Ok(StaticConfig::default());
    }

    let contents = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let config = StaticConfig::from_toml(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Apply environment overrides through `lookup` (usually `std::env::var`)
pub fn apply_env_overrides<F>(config: &mut StaticConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_SERIAL_PORT).filter(|p| !p.trim().is_empty()) {
        debug!("{} overrides serial port: {}", ENV_SERIAL_PORT, port);
        config.device.port = port.trim().to_string();
    }

    if let Some(value) = lookup(ENV_BAUD_RATE) {
        let baud_rate = value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnv {
            var: ENV_BAUD_RATE,
            value: value.clone(),
        })?;
        debug!("{} overrides baud rate: {}", ENV_BAUD_RATE, baud_rate);
        config.device.baud_rate = baud_rate;
    }

    Ok(())
}
