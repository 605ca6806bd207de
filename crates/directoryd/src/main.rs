//! directoryd - overlay directory daemon
//!
//! Keeps a signed view of the overlay topology, gossips adjacency changes
//! through the local relay, and bootstraps from a neighbor's graph export.

use anyhow::Context;
use clap::Parser;
use directoryd::config::{Config, NodeConfig};
use directoryd::server::Server;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "directoryd=info,directory_core=info,directory_net=info";

fn init_logging(config: &Config) {
    let filter = if config.verbose {
        EnvFilter::new("directoryd=debug,directory_core=debug,directory_net=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let (json, pretty) = if config.log_format == "json" {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

async fn run(config: Config) -> anyhow::Result<()> {
    let node_config = NodeConfig::load(&config.config)?;
    let server = Arc::new(
        Server::new(node_config, config.fetch_timeout())
            .context("Failed to initialize server")?,
    );

    info!("Node address {}", server.local_address());

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown_server.shutdown();
        }
    });

    server.run().await.context("Server error")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    init_logging(&config);

    info!(
        "directoryd v{} - overlay directory daemon",
        env!("CARGO_PKG_VERSION")
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
