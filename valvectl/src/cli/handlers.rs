//! Command execution handlers

use anyhow::Result;
use colored::*;
use std::sync::Arc;
use valve_core::DeviceConfig;
use valve_hardware::{DeviceSession, NativeOpener, NativePortDiscovery};

use crate::client::ValveClient;
use crate::format::{
    format_connection, format_health, format_ports, format_score_result, format_success,
};

use super::commands::*;

/// Handle send command
pub async fn handle_send(
    client: &ValveClient,
    score: i64,
    name: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let result = client.send_score(score, name).await?;
    println!("{}", format_score_result(&result, &format.into())?);
    Ok(())
}

/// Handle reset command
pub async fn handle_reset(client: &ValveClient, format: &OutputFormat) -> Result<()> {
    let result = client.reset_valve().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => println!("{}", format_success(&result.message)),
    }

    Ok(())
}

/// Handle status command.
///
/// A controller that is not connected is reported as an error so scripts
/// can test the exit code.
pub async fn handle_status(client: &ValveClient, format: &OutputFormat) -> Result<()> {
    let status = client.test_connection().await?;
    println!("{}", format_connection(&status, &format.into())?);

    if !status.connected {
        return Err(anyhow::anyhow!("{}", status.message));
    }

    Ok(())
}

/// Handle ports command
pub async fn handle_ports(client: &ValveClient, format: &OutputFormat) -> Result<()> {
    let ports = client.list_ports().await?;
    println!("{}", format_ports(&ports, &format.into())?);
    Ok(())
}

/// Handle health command
pub async fn handle_health(client: &ValveClient, format: &OutputFormat) -> Result<()> {
    let status = client.health().await?;
    println!("{}", format_health(&status, &format.into())?);
    Ok(())
}

/// Handle console command.
///
/// Opens the serial port directly; the server must not hold it at the same
/// time.
pub async fn handle_console(device: Option<String>, baud: u32) -> Result<()> {
    let config = DeviceConfig {
        baud_rate: baud,
        ..device.map(DeviceConfig::for_port).unwrap_or_default()
    };

    let discovery = Arc::new(NativePortDiscovery);
    let session = DeviceSession::new(
        config.clone(),
        Arc::new(NativeOpener::new(config.read_timeout())),
        discovery,
    );

    if let Err(e) = session.ensure_connected().await {
        eprintln!("{} Could not open port {}.", "✗".red().bold(), config.port);
        eprintln!("Make sure the port is correct and Arduino is connected.");
        return Err(e.into());
    }

    let input = crate::console::stdin_lines();
    let mut output = std::io::stdout();
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    crate::console::run(&session, input, &mut output, interrupt).await
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
