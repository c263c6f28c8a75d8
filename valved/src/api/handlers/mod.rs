//! API request handlers for the valve controller daemon.
//!
//! - [`valve`] - score submission, reset and connection check
//! - [`ports`] - serial port listing for diagnostics
//! - [`info`] - root status endpoint
//!
//! Handlers take `State<AppState>`, log the request at debug level and
//! return plain JSON bodies. Failures go through [`ApiError`] and render as
//! `{"error": "..."}`.
//!
//! [`ApiError`]: crate::api::error::ApiError

pub mod info;
pub mod ports;
pub mod valve;
