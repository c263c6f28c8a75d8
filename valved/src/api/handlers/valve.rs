//! Valve control handlers

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use tracing::{debug, info, warn};
use valve_core::api::{
    ConnectionResponse, ControlValveRequest, ControlValveResponse, ResetValveResponse,
};

/// Submit a score and open the valve accordingly
/// POST /api/control-valve
///
/// The body is taken raw so that a missing or malformed payload produces
/// the same JSON error shape as a bad score.
pub async fn control_valve(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ControlValveResponse>, ApiError> {
    debug!("Request: POST /api/control-valve ({} bytes)", body.len());

    let request = ControlValveRequest::from_body(&body)?;
    info!("Score {} received from {}", request.score, request.player);

    let outcome = state.session.send(request.score).await;
    if !outcome.success {
        return Err(ApiError::internal_error(outcome.message));
    }

    Ok(Json(ControlValveResponse {
        success: true,
        message: outcome.message,
        score: request.score,
        player: request.player,
    }))
}

/// Close the valve
/// POST /api/reset-valve
pub async fn reset_valve(
    State(state): State<AppState>,
) -> Result<Json<ResetValveResponse>, ApiError> {
    debug!("Request: POST /api/reset-valve");

    let outcome = state.session.reset().await;
    if !outcome.success {
        return Err(ApiError::internal_error(outcome.message));
    }

    Ok(Json(ResetValveResponse {
        success: true,
        message: "Valve closed".to_string(),
    }))
}

/// Check that the controller can be reached, connecting if needed
/// GET /api/test-connection
pub async fn test_connection(
    State(state): State<AppState>,
) -> (StatusCode, Json<ConnectionResponse>) {
    debug!("Request: GET /api/test-connection");

    match state.session.ensure_connected().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ConnectionResponse {
                connected: true,
                port: Some(state.session.port().to_string()),
                message: "Arduino connected".to_string(),
            }),
        ),
        Err(e) => {
            warn!("Connection test failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ConnectionResponse {
                    connected: false,
                    port: None,
                    message: "Arduino not connected".to_string(),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{call, get, mock_app, post_empty, post_json};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use valve_hardware::mock::{MockDevice, MockOpener, MockPortDiscovery};

    fn plugged_in() -> Arc<MockOpener> {
        Arc::new(MockOpener::new(MockDevice::new()))
    }

    #[tokio::test]
    async fn test_control_valve_success() {
        let opener = plugged_in();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let (status, json) = call(
            app,
            post_json("/api/control-valve", r#"{"score":75,"name":"Happy"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["score"], 75);
        assert_eq!(json["player"], "Happy");
        assert_eq!(json["message"], "ACK 75");
        assert_eq!(opener.device().written_lines(), vec!["75"]);
    }

    #[tokio::test]
    async fn test_control_valve_coerces_score_and_defaults_player() {
        let opener = plugged_in();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let request = post_json("/api/control-valve", r#"{"score":" 42 "}"#);
        let (status, json) = call(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["score"], 42);
        assert_eq!(json["player"], "Unknown");
        assert_eq!(opener.device().written_lines(), vec!["42"]);
    }

    #[tokio::test]
    async fn test_control_valve_fractional_score_is_truncated() {
        let opener = plugged_in();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let (status, json) = call(
            app,
            post_json("/api/control-valve", r#"{"score":75.9,"name":"Happy"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["score"], 75);
        assert_eq!(json["message"], "ACK 75");
        assert_eq!(opener.device().written_lines(), vec!["75"]);
    }

    #[tokio::test]
    async fn test_control_valve_score_not_a_number() {
        let opener = plugged_in();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let (status, json) = call(app, post_json("/api/control-valve", r#"{"score":"abc"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "error": "Score must be a number" }));
        assert_eq!(opener.open_count(), 0);
    }

    #[tokio::test]
    async fn test_control_valve_without_body() {
        let opener = plugged_in();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let (status, json) = call(app, post_empty("/api/control-valve")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "error": "Score is required" }));
        assert_eq!(opener.open_count(), 0);
    }

    #[tokio::test]
    async fn test_control_valve_null_score() {
        let app = mock_app(plugged_in(), MockPortDiscovery::default());

        let (status, json) = call(
            app,
            post_json("/api/control-valve", r#"{"score":null,"name":"X"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Score is required");
    }

    #[tokio::test]
    async fn test_control_valve_malformed_json() {
        let app = mock_app(plugged_in(), MockPortDiscovery::default());

        let (status, json) = call(app, post_json("/api/control-valve", "{score: 5")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_control_valve_out_of_range_never_reaches_device() {
        let opener = plugged_in();
        opener.device().forbid_writes();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let (status, json) = call(app, post_json("/api/control-valve", r#"{"score":101}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Score must be between 0 and 100");
        assert!(opener.device().wire().is_empty());
    }

    #[tokio::test]
    async fn test_control_valve_device_missing() {
        let opener = Arc::new(MockOpener::unavailable(MockDevice::new()));
        let app = mock_app(opener, MockPortDiscovery::default());

        let (status, json) = call(app, post_json("/api/control-valve", r#"{"score":10}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json["error"].as_str().unwrap();
        assert!(message.starts_with("No Arduino connection: "), "{}", message);
    }

    #[tokio::test]
    async fn test_reset_valve() {
        let opener = plugged_in();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let (status, json) = call(app, post_empty("/api/reset-valve")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "success": true, "message": "Valve closed" }));
        assert_eq!(opener.device().written_lines(), vec!["0"]);
    }

    #[tokio::test]
    async fn test_reset_valve_device_missing() {
        let opener = Arc::new(MockOpener::unavailable(MockDevice::new()));
        let app = mock_app(opener, MockPortDiscovery::default());

        let (status, json) = call(app, post_empty("/api/reset-valve")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_connection_ok() {
        let opener = plugged_in();
        let app = mock_app(opener.clone(), MockPortDiscovery::default());

        let (status, json) = call(app, get("/api/test-connection")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!({ "connected": true, "port": "COM5", "message": "Arduino connected" })
        );
        assert_eq!(opener.open_count(), 1);
    }

    #[tokio::test]
    async fn test_connection_without_device() {
        let opener = Arc::new(MockOpener::unavailable(MockDevice::new()));
        let app = mock_app(opener, MockPortDiscovery::default());

        let (status, json) = call(app, get("/api/test-connection")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json,
            json!({ "connected": false, "message": "Arduino not connected" })
        );
    }
}
