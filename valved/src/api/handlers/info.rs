//! Root endpoint handler

use crate::api::AppState;

use axum::{extract::State, Json};
use tracing::debug;
use valve_core::api::ServiceStatus;

/// Service name reported by the root endpoint
pub const SERVICE_NAME: &str = "Valve Controller Backend";

/// Root endpoint handler
/// GET /
pub async fn root(State(state): State<AppState>) -> Json<ServiceStatus> {
    debug!("Request: GET /");

    Json(ServiceStatus {
        status: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        arduino_port: state.session.port().to_string(),
    })
}
