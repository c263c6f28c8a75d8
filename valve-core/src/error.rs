//! Error types for the valve controller

use thiserror::Error;

/// Core error type for valve controller operations
#[derive(Error, Debug)]
pub enum ValveError {
    /// Serial port errors on an open handle
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Device disconnected (USB unplugged, power cycle)
    #[error("Device disconnected: {0}")]
    DeviceDisconnected(String),

    /// The serial port could not be opened
    ///
    /// This is the expected state while the controller is unplugged, so
    /// callers treat it as recoverable.
    #[error("Could not open serial port {port}: {cause}")]
    Connect { port: String, cause: String },

    /// Score outside of 0-100
    #[error("Score must be between 0 and 100")]
    ScoreOutOfRange(i64),

    /// Invalid external input
    #[error("{0}")]
    Validation(String),
}

/// Result type alias for valve controller operations
pub type Result<T> = std::result::Result<T, ValveError>;
