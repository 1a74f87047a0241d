//! Arena Game Server
//!
//! Loads configuration, connects to the bus and runs the authoritative
//! simulation until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arena::{BusConnector, GameServer, ServerConfig, VERSION};

/// Command-line arguments. Flags override the config file and environment.
#[derive(Debug, Parser)]
#[command(name = "arena-server", version, about)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "ARENA_CONFIG")]
    config: Option<PathBuf>,

    /// Bus endpoint
    #[arg(long, env = "ARENA_ENDPOINT")]
    endpoint: Option<String>,

    /// Simulation tick rate (Hz)
    #[arg(long, env = "ARENA_TICK_RATE")]
    tick_rate: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arena=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(endpoint) = args.endpoint {
        config.bus.endpoint = endpoint;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate_hz = tick_rate;
    }
    config.validate().context("Invalid config")?;

    info!("Arena Server v{}", VERSION);
    info!("Tick Rate: {} Hz", config.tick_rate_hz);
    info!("Bus: {}", config.bus.endpoint);

    let connector = BusConnector::nats(config.bus.endpoint.clone());
    let server = Arc::new(GameServer::new(config));

    let runner = server.clone();
    let mut run = tokio::spawn(async move { runner.run(connector).await });

    tokio::select! {
        result = &mut run => {
            return result.context("Server task failed")?.context("Server stopped");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    run.await.context("Server task failed")??;
    Ok(())
}
