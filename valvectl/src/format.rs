//! Output formatting utilities for the CLI
//!
//! Provides table and JSON formatting with colors.

use anyhow::Result;
use colored::*;
use valve_core::api::{ConnectionResponse, ControlValveResponse, PortsResponse, ServiceStatus};

use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Format a control-valve response
pub fn format_score_result(result: &ControlValveResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Table => Ok(format_success(&format!(
            "Valve opened {}% for {} ({})",
            result.score.to_string().cyan(),
            result.player.bold(),
            result.message.dimmed()
        ))),
    }
}

/// Format a test-connection response
pub fn format_connection(status: &ConnectionResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(status)?),
        OutputFormat::Table => {
            let mut output = String::new();
            output.push_str(&"Arduino Connection".bold().to_string());
            output.push('\n');
            output.push_str(&format!(
                "Connected: {}",
                if status.connected {
                    "Yes".green()
                } else {
                    "No".red()
                }
            ));
            if let Some(port) = &status.port {
                output.push('\n');
                output.push_str(&format!("Port: {}", port.cyan()));
            }
            output.push('\n');
            output.push_str(&format!("Message: {}", status.message));
            Ok(output)
        }
    }
}

/// Format the serial port listing
pub fn format_ports(ports: &PortsResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(ports)?),
        OutputFormat::Table => {
            if ports.ports.is_empty() {
                return Ok("No serial ports found".yellow().to_string());
            }

            #[derive(Tabled)]
            struct PortRow {
                #[tabled(rename = "Device")]
                device: String,
                #[tabled(rename = "Description")]
                description: String,
            }

            let rows: Vec<PortRow> = ports
                .ports
                .iter()
                .map(|port| PortRow {
                    device: port.device.cyan().to_string(),
                    description: port.description.clone(),
                })
                .collect();

            let table = Table::new(rows).with(Style::rounded()).to_string();
            Ok(format!("{}\n{}", "Serial Ports:".bold(), table))
        }
    }
}

/// Format the root endpoint status
pub fn format_health(status: &ServiceStatus, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(status)?),
        OutputFormat::Table => {
            let mut output = String::new();
            output.push_str(&status.status.bold().to_string());
            output.push('\n');
            output.push_str(&format!("Version: {}", status.version.cyan()));
            output.push('\n');
            output.push_str(&format!("Arduino Port: {}", status.arduino_port.cyan()));
            Ok(output)
        }
    }
}

/// Format success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}
