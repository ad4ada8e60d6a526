mod commands;

use std::net::IpAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use rsrelay::build_info::{self, BuildInfo};
use rsrelay::config::DEFAULT_CONFIG_FILE;

// ============================================================================
// CLI Types
// ============================================================================

/// rsrelay - session-cookie relay for the research storage API
#[derive(Parser, Debug)]
#[command(version = rsrelay::build_info::VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Host to bind to (overrides config file)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Remote API base URL (overrides config file)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Print build information as JSON
    Version,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            endpoint,
        } => commands::serve::run(&config, host, port, endpoint).await,
        Commands::Version => {
            let info = BuildInfo::current(build_info::default_user_agent());
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
