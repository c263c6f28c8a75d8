//! API module for the valve controller server
//!
//! Contains the REST API implementation with Axum router and handlers.

pub(crate) mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use valve_hardware::{DeviceSession, PortDiscovery};

/// Application state shared across all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    /// Session owning the serial connection
    pub session: Arc<DeviceSession>,
    /// Serial port enumeration
    pub discovery: Arc<dyn PortDiscovery>,
}

impl AppState {
    /// Create new application state
    pub fn new(session: Arc<DeviceSession>, discovery: Arc<dyn PortDiscovery>) -> Self {
        Self { session, discovery }
    }
}

/// Create the main API router with all endpoints
pub(crate) fn create_router(state: AppState) -> Router {
    info!("Setting up API router...");

    // The scoring UI is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024)); // 1MB limit

    Router::new()
        // Valve control endpoints
        .route(
            "/api/control-valve",
            post(handlers::valve::control_valve),
        )
        .route("/api/reset-valve", post(handlers::valve::reset_valve))
        .route(
            "/api/test-connection",
            get(handlers::valve::test_connection),
        )
        // Diagnostics
        .route("/api/ports", get(handlers::ports::list_ports))
        // Root endpoint
        .route("/", get(handlers::info::root))
        .layer(middleware_stack)
        .with_state(state)
}

/// Error handling utilities
pub(crate) mod error {
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use tracing::warn;
    use valve_core::api::ErrorResponse;
    use valve_core::ValveError;

    /// Custom error type for API responses
    #[derive(Debug)]
    pub struct ApiError {
        pub status_code: StatusCode,
        pub message: String,
    }

    impl ApiError {
        /// Create a new API error
        pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
            Self {
                status_code,
                message: message.into(),
            }
        }

        /// Create a bad request error
        pub fn bad_request(message: impl Into<String>) -> Self {
            Self::new(StatusCode::BAD_REQUEST, message)
        }

        /// Create an internal server error
        pub fn internal_error(message: impl Into<String>) -> Self {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            warn!("API Error {}: {}", self.status_code, self.message);

            let body = ErrorResponse {
                error: self.message,
            };

            (self.status_code, Json(body)).into_response()
        }
    }

    /// Input problems are the caller's fault; everything else is ours
    impl From<ValveError> for ApiError {
        fn from(err: ValveError) -> Self {
            match err {
                ValveError::Validation(msg) => Self::bad_request(msg),
                _ => Self::internal_error(err.to_string()),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_valve_error_status_mapping() {
            let err: ApiError = ValveError::Validation("Score is required".to_string()).into();
            assert_eq!(err.status_code, StatusCode::BAD_REQUEST);
            assert_eq!(err.message, "Score is required");

            let err: ApiError = ValveError::ScoreOutOfRange(101).into();
            assert_eq!(err.status_code, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.message, "Score must be between 0 and 100");

            let err: ApiError = ValveError::Connect {
                port: "COM5".to_string(),
                cause: "Access denied".to_string(),
            }
            .into();
            assert_eq!(err.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
