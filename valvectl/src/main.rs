//! Valve Controller CLI
//!
//! Command-line interface for the valve controller server, plus a direct
//! serial console.

use anyhow::Result;
use clap::Parser;
use valvectl::cli::{
    generate_completion, handle_console, handle_health, handle_ports, handle_reset, handle_send,
    handle_status, Cli, Commands, OutputFormat,
};
use valvectl::client::ValveClient;
use valvectl::config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that never talk to the server
    match cli.command {
        Commands::Completion { shell } => {
            generate_completion(shell);
            return Ok(());
        }
        Commands::Console { ref device, baud } => {
            init_tracing(cli.verbose);
            if let Err(e) = handle_console(device.clone(), baud).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            return Ok(());
        }
        _ => {}
    }

    // CLI arguments first; env only fills what they leave unset
    let mut builder = CliConfig::builder();
    if let Some(ref server) = cli.server {
        builder = builder.with_server_url(server)?;
    }
    if let Some(ref format) = cli.format {
        builder = builder.with_output_format(format.as_str())?;
    }
    if let Some(timeout) = cli.timeout {
        builder = builder.with_timeout(timeout)?;
    }
    builder = builder.with_env_overrides();

    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let output_format = match config.output_format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };

    if cli.verbose {
        eprintln!("Server URL: {}", config.server_url);
        eprintln!("Output format: {:?}", output_format);
    }

    let client = ValveClient::with_config(
        config.server_url.clone(),
        config.timeout,
        3,
        std::time::Duration::from_millis(500),
    )?;

    let result = match cli.command {
        Commands::Send { score, ref name } => {
            handle_send(&client, score, name.as_deref(), &output_format).await
        }
        Commands::Reset => handle_reset(&client, &output_format).await,
        Commands::Status => handle_status(&client, &output_format).await,
        Commands::Ports => handle_ports(&client, &output_format).await,
        Commands::Health => handle_health(&client, &output_format).await,
        Commands::Console { .. } | Commands::Completion { .. } => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if cli.verbose {
            eprintln!("Error details: {:?}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Log to stderr so device lines do not mix with console prompts
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
