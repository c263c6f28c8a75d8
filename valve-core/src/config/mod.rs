//! Configuration types for the valve controller
//!
//! [`StaticConfig`] holds the server and serial device settings. It is loaded
//! once at startup and stays immutable afterwards.

mod paths;
mod static_config;

pub use paths::default_config_path;
pub use static_config::{DeviceConfig, ServerConfig, StaticConfig, DEFAULT_BAUD_RATE};
