//! Mock HTTP server - CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use mock_http_server::{MockServer, ServerConfig};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mock-http-server",
    about = "Configurable mock HTTP server - scripted response sequences for testing",
    version
)]
struct Args {
    /// Path to the YAML route table
    #[arg(short, long, env = "CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// HTTP port to listen on (a non-zero port in the config file wins)
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // JSON log lines on stderr, one per completed request
    let subscriber = FmtSubscriber::builder()
        .json()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::from_file(&args.config)
        .with_context(|| format!("wrong config file {:?}", args.config))?;

    if args.validate {
        println!(
            "Configuration is valid ({} routes defined)",
            config.routes.len()
        );
        return Ok(());
    }

    let port = config.effective_port(args.port);
    let server = MockServer::new(config, port);

    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        info!("shutdown signal received");
    };

    server.start(shutdown).await?;

    Ok(())
}
