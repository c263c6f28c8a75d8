//! Core data types shared by the daemon, the CLI and the hardware layer

use crate::error::{Result, ValveError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Valve opening percentage commanded by a game score.
///
/// Always within `0..=100`; construction through [`Score::new`] or
/// `TryFrom<i64>` is the only way to get one, so anything holding a `Score`
/// can be written to the device as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    /// Lowest accepted score (valve closed)
    pub const MIN: i64 = 0;
    /// Highest accepted score (valve fully open)
    pub const MAX: i64 = 100;
    /// Score that closes the valve
    pub const CLOSED: Score = Score(0);

    /// Validate a raw integer score.
    pub fn new(value: i64) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValveError::ScoreOutOfRange(value))
        }
    }

    /// Percentage as an integer
    pub fn value(self) -> u8 {
        self.0
    }

    /// Line written to the device for this score, terminator excluded
    pub fn to_command(self) -> String {
        self.0.to_string()
    }
}

impl TryFrom<i64> for Score {
    type Error = ValveError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one command round-trip with the device.
///
/// Device-facing failures are folded into `success: false` with a readable
/// message; they never escape as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
    /// Every line the device printed in answer, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<String>,
}

impl SendOutcome {
    /// The command reached the device
    pub fn delivered(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            replies: Vec::new(),
        }
    }

    /// Attach the raw reply lines
    pub fn with_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    /// The command did not reach the device (or was rejected before)
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            replies: Vec::new(),
        }
    }
}

/// Snapshot of an OS-visible serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Device identifier (e.g. `/dev/ttyACM0`, `COM5`)
    pub device: String,
    /// Human-readable description
    pub description: String,
}
