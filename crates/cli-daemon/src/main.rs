//! CLI entry point for the media helper
//!
//! Parses command line arguments, initialises logging and starts the daemon.

use clap::Parser;
use media_helper::{Config, Daemon};
use std::path::PathBuf;
use std::process::ExitCode;

/// Media Helper - local yt-dlp service for browser audio extraction
#[derive(Parser, Debug)]
#[command(name = "media-helper")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml); defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the background update check
    #[arg(long, default_value = "false")]
    no_update: bool,

    /// Do not show a desktop notification once running
    #[arg(long, default_value = "false")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("media helper v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = match Config::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_update {
        config.updater.enabled = false;
    }
    if args.quiet {
        config.notifications.enabled = false;
    }

    let daemon = match Daemon::new(config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize helper");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        install_dir = %daemon.install_dir.display(),
        version = %daemon.binary.version(),
        "helper initialized"
    );

    if let Err(e) = daemon.run().await {
        tracing::error!(error = %e, "helper stopped");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
