//! CLI command and subcommand definitions

use clap::{Parser, Subcommand};

/// Valve Controller CLI
#[derive(Parser, Debug)]
#[command(name = "valvectl")]
#[command(version, about = "Valve Controller CLI", long_about = None)]
pub struct Cli {
    /// Server URL (default: http://localhost:5000, env: VALVECTL_SERVER)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Request timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty table output
    Table,
    /// JSON output
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
        }
    }
}

impl From<&OutputFormat> for crate::format::OutputFormat {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Json => crate::format::OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a score (0-100) and open the valve accordingly
    Send {
        /// Score; out-of-range values are rejected by the server
        #[arg(allow_negative_numbers = true)]
        score: i64,

        /// Player name shown in the server log
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Close the valve
    Reset,

    /// Check whether the server can reach the controller
    Status,

    /// List serial ports on the server host
    Ports,

    /// Check server connectivity
    Health,

    /// Interactive console talking to the controller directly over serial
    Console {
        /// Serial device path (e.g., /dev/ttyACM0, COM5)
        #[arg(short, long)]
        device: Option<String>,

        /// Serial baud rate
        #[arg(short, long, default_value_t = valve_core::config::DEFAULT_BAUD_RATE)]
        baud: u32,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
