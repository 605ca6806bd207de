//! Configuration for directoryd

use clap::Parser;
use directory_net::NeighborTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default route neighbors serve their graph export on
pub const DEFAULT_GRAPH_ROUTE: &str = "/get_network_graph";

/// directoryd - overlay directory daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "directoryd")]
#[command(about = "Authenticated overlay directory and adjacency gossip daemon")]
pub struct Config {
    /// Path to the node configuration file (JSON)
    #[arg(short, long, env = "DIRECTORYD_CONFIG")]
    pub config: PathBuf,

    /// Timeout for each bootstrap graph request, in seconds
    #[arg(long, default_value = "10")]
    pub fetch_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("Fetch timeout must be at least one second");
        }
        if self.log_format != "json" && self.log_format != "pretty" {
            anyhow::bail!("Log format must be 'json' or 'pretty'");
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_graph_route() -> String {
    DEFAULT_GRAPH_ROUTE.to_string()
}

/// Node configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Directly connected peers, in bootstrap order
    #[serde(default)]
    pub neighbors: NeighborTable,
    /// PEM private key file
    pub private_key: PathBuf,
    /// Relay Unix domain socket
    pub socket_file: PathBuf,
    /// Port for the graph export endpoint
    pub listen_port: u16,
    /// Route requested from neighbors during bootstrap
    #[serde(default = "default_graph_route")]
    pub get_graph_route: String,
}

impl NodeConfig {
    /// Read and validate a node configuration file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid node config {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.get_graph_route.starts_with('/') {
            anyhow::bail!("getGraphRoute must start with '/'");
        }
        for neighbor in &self.neighbors {
            if neighbor.hostname.is_empty() {
                anyhow::bail!("Neighbor {} has an empty hostname", neighbor.address);
            }
            if neighbor.port == 0 {
                anyhow::bail!("Neighbor {} has port 0", neighbor.address);
            }
        }
        Ok(())
    }
}
