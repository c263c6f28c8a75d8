//! Serial port listing

use crate::api::AppState;

use axum::{extract::State, Json};
use tracing::debug;
use valve_core::api::PortsResponse;

/// List serial ports visible to the host
/// GET /api/ports
pub async fn list_ports(State(state): State<AppState>) -> Json<PortsResponse> {
    debug!("Request: GET /api/ports");

    let ports = state.discovery.list_ports();
    debug!("Found {} serial port(s)", ports.len());

    Json(PortsResponse { ports })
}
