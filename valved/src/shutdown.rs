//! Shutdown handling for graceful daemon termination
//!
//! The valve must never stay open because the daemon went away, so `main`
//! runs [`close_valve`] after the server future returns, whatever the reason.

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use valve_hardware::DeviceSession;

/// Send the closing command and release the serial port
pub async fn close_valve(session: &Arc<DeviceSession>) {
    info!("Closing valve on {} before exit...", session.port());
    session.close().await;
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
