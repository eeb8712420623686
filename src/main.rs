//! ai-gateway-rs — AI inference gateway binary entry point.

#![allow(missing_docs)]

use ai_gateway::server;
use clap::Parser;
use std::process::ExitCode;

/// AI inference gateway.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the gateway config file.
    #[arg(short, long, env = "GATEWAY_CONFIG_PATH")]
    config: Option<String>,

    /// Overrides the config file's server.host.
    #[arg(long)]
    host: Option<String>,

    /// Overrides the config file's server.port.
    #[arg(long)]
    port: Option<u16>,

    /// Raises the log level; repeat for more (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let overrides = server::StartupOverrides {
        host: cli.host,
        port: cli.port,
        verbose: cli.verbose,
    };

    match server::run_server_with_config(cli.config.as_deref(), overrides).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
