//! Valve Controller Server
//!
//! HTTP bridge between the scoring front end and the Arduino driving the
//! valve. Scores arrive as JSON and are forwarded over the serial line as
//! one decimal line each.
//!
//! The serial port is opened lazily: the server starts (and answers
//! `GET /api/test-connection` with `connected: false`) even when the
//! controller is unplugged, and picks it up on the next request once it
//! appears.

mod api;
mod config;
mod shutdown;

use anyhow::{Context, Result};
use api::AppState;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use valve_core::{default_config_path, StaticConfig};
use valve_hardware::mock::{MockDevice, MockOpener, MockPortDiscovery};
use valve_hardware::{
    DeviceSession, NativeOpener, NativePortDiscovery, PortDiscovery, SerialOpener,
};

/// Environment variable pointing at the configuration file
const ENV_CONFIG: &str = "VALVED_CONFIG";

/// Valve Controller API Server
#[derive(Parser, Debug)]
#[command(name = "valved")]
#[command(version, about = "Valve Controller API Server", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Serial device path (e.g., /dev/ttyACM0, COM5)
    #[arg(long)]
    device: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (simulated controller, no hardware needed)
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("Valve Controller Server starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.clone().unwrap_or_else(|| {
        std::env::var(ENV_CONFIG)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let mut static_config = config::load(&config_path).await?;
    config::apply_env_overrides(&mut static_config, |key| std::env::var(key).ok())?;
    apply_args(&mut static_config, &args);

    let device = &static_config.device;
    info!(
        "Serial device: {} @ {} baud{}",
        device.port,
        device.baud_rate,
        if args.mock { " (mock)" } else { "" }
    );

    let (opener, discovery): (Arc<dyn SerialOpener>, Arc<dyn PortDiscovery>) = if args.mock {
        let mock = MockDevice::new().with_banner("Valve controller ready");
        (
            Arc::new(MockOpener::new(mock)),
            Arc::new(MockPortDiscovery::single(&device.port, "Simulated valve controller")),
        )
    } else {
        (
            Arc::new(NativeOpener::new(device.read_timeout())),
            Arc::new(NativePortDiscovery),
        )
    };

    let session = Arc::new(DeviceSession::new(device.clone(), opener, discovery.clone()));

    // A missing controller is not fatal; requests retry the connection
    if let Err(e) = session.ensure_connected().await {
        warn!("Controller not available at startup: {}", e);
    }

    let bind_addr = format!(
        "{}:{}",
        static_config.server.hostname, static_config.server.port
    );
    let app = api::create_router(AppState::new(session.clone(), discovery));

    let served = serve(&bind_addr, app).await;

    // Runs on clean shutdown and on serve errors alike
    shutdown::close_valve(&session).await;

    served?;
    info!("Server shutdown complete");
    Ok(())
}

/// Command-line flags win over file and environment
fn apply_args(config: &mut StaticConfig, args: &Args) {
    if let Some(ref bind) = args.bind {
        config.server.hostname = bind.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref device) = args.device {
        config.device.port = device.clone();
    }
    if let Some(baud) = args.baud {
        config.device.baud_rate = baud;
    }
}

/// Bind the listener and serve until a shutdown signal arrives
async fn serve(bind_addr: &str, app: axum::Router) -> Result<()> {
    info!("Starting server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!("Valve Controller Server listening on {}", bind_addr);
    info!("Server ready!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
