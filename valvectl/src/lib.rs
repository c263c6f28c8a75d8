//! Valve Controller CLI Library
//!
//! Core functionality for the `valvectl` tool: an HTTP client for the
//! `valved` REST API and an interactive serial console for bench tests.
//!
//! ```no_run
//! use valvectl::client::ValveClient;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ValveClient::with_config(
//!     "http://localhost:5000".to_string(),
//!     10,
//!     3,
//!     Duration::from_millis(500),
//! )?;
//!
//! let status = client.test_connection().await?;
//! println!("Arduino connected: {}", status.connected);
//! # Ok(())
//! # }
//! ```

// Internal CLI implementation - not part of public API
#[doc(hidden)]
pub mod cli;

/// HTTP client for communicating with the valve controller server.
pub mod client;

/// Configuration types for the CLI tool.
pub mod config;

/// Interactive serial console.
pub mod console;

// Internal formatting functions - not part of public API
#[doc(hidden)]
pub mod format;
