//! CLI entry point for the Stream Bridge daemon
//!
//! Parses command line arguments, loads configuration, and starts the daemon.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use stream_bridge::{Config, Daemon};
use tracing_subscriber::EnvFilter;

/// Stream Bridge - control plane for RTMP-to-RTSP conversions and test streams
#[derive(Parser, Debug)]
#[command(name = "stream-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = if args.config.exists() {
        match Config::load(&args.config) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %args.config.display(), error = %e, "failed to load configuration");
                return ExitCode::FAILURE;
            }
        }
    } else {
        tracing::warn!(
            path = %args.config.display(),
            "configuration file not found, using defaults with environment overrides"
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    tracing::info!(
        bind = %config.api.bind,
        port = config.api.port,
        "starting Stream Bridge daemon"
    );

    if let Err(e) = Daemon::new(config).run().await {
        tracing::error!(error = %e, "daemon error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
