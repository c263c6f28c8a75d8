//! Valve Controller Core Library
//!
//! Shared types, API models, and configuration for the valve controller.
//! This crate is used by the hardware layer, the daemon and the CLI.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{default_config_path, DeviceConfig, ServerConfig, StaticConfig};
pub use error::*;
pub use types::*;
