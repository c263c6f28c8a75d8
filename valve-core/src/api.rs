//! API models for the valve controller REST API
//!
//! Request parsing lives here too, so the HTTP daemon and other front ends
//! apply the same input rules.

use crate::error::{Result, ValveError};
use crate::types::PortInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error message when the request carries no score
pub const SCORE_REQUIRED: &str = "Score is required";

/// Error message when the score cannot be read as an integer
pub const SCORE_NOT_A_NUMBER: &str = "Score must be a number";

/// Error message when the body is not JSON at all
pub const INVALID_JSON: &str = "Invalid JSON body";

/// Player name used when the request does not name one
pub const DEFAULT_PLAYER: &str = "Unknown";

/// Body sent by clients to `POST /api/control-valve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Validated control request.
///
/// `score` is an integer but not yet range-checked; range checking belongs
/// to the device session so every caller gets the same message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlValveRequest {
    pub score: i64,
    pub player: String,
}

impl ControlValveRequest {
    /// Parse a raw request body.
    ///
    /// An empty body is treated like `{}` and reported as a missing score.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ValveError::Validation(SCORE_REQUIRED.to_string()));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|_| ValveError::Validation(INVALID_JSON.to_string()))?;

        Self::from_json(&value)
    }

    /// Extract score and player name from a decoded JSON document.
    pub fn from_json(value: &Value) -> Result<Self> {
        let score = match value.get("score") {
            None | Some(Value::Null) => {
                return Err(ValveError::Validation(SCORE_REQUIRED.to_string()))
            }
            Some(raw) => coerce_score(raw)?,
        };

        let player = match value.get("name") {
            None | Some(Value::Null) => DEFAULT_PLAYER.to_string(),
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
        };

        Ok(Self { score, player })
    }
}

/// Convert a loosely typed JSON score to an integer.
///
/// Accepts integers, floats (truncated toward zero), booleans and decimal
/// strings with optional sign and surrounding whitespace.
pub fn coerce_score(raw: &Value) -> Result<i64> {
    let not_a_number = || ValveError::Validation(SCORE_NOT_A_NUMBER.to_string());

    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(not_a_number),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_a_number()),
        _ => Err(not_a_number()),
    }
}

/// Successful `POST /api/control-valve` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlValveResponse {
    pub success: bool,
    pub message: String,
    pub score: i64,
    pub player: String,
}

/// Successful `POST /api/reset-valve` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetValveResponse {
    pub success: bool,
    pub message: String,
}

/// `GET /api/test-connection` response, for both outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub message: String,
}

/// `GET /api/ports` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsResponse {
    pub ports: Vec<PortInfo>,
}

/// `GET /` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub version: String,
    pub arduino_port: String,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
