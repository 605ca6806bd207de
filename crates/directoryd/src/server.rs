//! directoryd server - main service loop

use crate::config::{NodeConfig, DEFAULT_GRAPH_ROUTE};
use crate::http::build_router;
use crate::node::{bootstrap_shared, BootstrapError, DirectoryNode, SharedNode};
use bytes::Bytes;
use directory_core::{DirectoryRecord, IdentityKeys};
use directory_net::{relay, FetchError, HttpGraphFetcher, RelayError, RelaySender};
use parking_lot::Mutex;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory error: {0}")]
    Directory(#[from] directory_core::Error),
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Server state
pub struct Server {
    config: NodeConfig,
    fetch_timeout: Duration,
    identity: Arc<IdentityKeys>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a server, loading the identity named in the node config
    pub fn new(config: NodeConfig, fetch_timeout: Duration) -> Result<Self, ServerError> {
        let identity = IdentityKeys::load(&config.private_key)?;
        Ok(Self::with_identity(config, fetch_timeout, identity))
    }

    /// Create a server around an already loaded identity
    pub fn with_identity(config: NodeConfig, fetch_timeout: Duration, identity: IdentityKeys) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            fetch_timeout,
            identity: Arc::new(identity),
            shutdown_tx,
        }
    }

    pub fn local_address(&self) -> &directory_core::Address {
        self.identity.address()
    }

    /// Run the server
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.listen_port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Run the server with the graph export bound to `listener`
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!(
            "Starting directoryd as {} ({} neighbors)",
            self.local_address().short(),
            self.config.neighbors.len()
        );

        let node: SharedNode = Arc::new(Mutex::new(DirectoryNode::new(
            self.identity.clone(),
            self.config.neighbors.clone(),
        )?));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let (relay_tx, mut relay_rx) = relay::connect(&self.config.socket_file).await?;
        info!("Connected to relay at {}", self.config.socket_file.display());

        // Neighbors may be bootstrapping from us at the same time
        let http_handle = self.spawn_http(listener, node.clone())?;

        let has_neighbors = node.lock().has_neighbors();
        if has_neighbors {
            if let Err(e) = self.bootstrap(&node, &relay_tx).await {
                self.shutdown();
                if let Err(join) = http_handle.await {
                    warn!("HTTP task ended abnormally: {}", join);
                }
                return Err(e);
            }
        }

        let result = 'relay: loop {
            tokio::select! {
                frame = relay_rx.recv() => {
                    match frame {
                        Some(Ok(frame)) => {
                            for out in handle_frame(&node, frame) {
                                if let Err(e) = relay_tx.send(out).await {
                                    break 'relay Err(e.into());
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!("Relay link broken: {}", e);
                            break Err(RelayError::from(e).into());
                        }
                        None => {
                            info!("Relay closed the link");
                            break Ok(());
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutting down...");
                    break Ok(());
                }
            }
        };

        self.shutdown();
        if let Err(e) = http_handle.await {
            warn!("HTTP task ended abnormally: {}", e);
        }

        result
    }

    /// Adopt a neighbor's graph, then announce our own record once
    async fn bootstrap(&self, node: &SharedNode, relay_tx: &RelaySender) -> Result<(), ServerError> {
        let fetcher = HttpGraphFetcher::new(self.fetch_timeout)?;
        bootstrap_shared(node, &fetcher, &self.config.get_graph_route).await?;

        let local = node.lock().export_neighborhood();
        relay_tx.send(serde_json::to_vec(&local)?).await?;
        info!("Announced local neighborhood");
        Ok(())
    }

    fn spawn_http(
        &self,
        listener: TcpListener,
        node: SharedNode,
    ) -> Result<tokio::task::JoinHandle<()>, ServerError> {
        info!("Serving network graph on {}{}", listener.local_addr()?, DEFAULT_GRAPH_ROUTE);

        let app = build_router(node, DEFAULT_GRAPH_ROUTE);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Ok(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }))
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Process one inbound relay frame.
///
/// Returns the frames to send back to the relay, in order: our re-signed
/// record if local adjacency changed, then the inbound frame unchanged if
/// the broadcast was accepted.
pub fn handle_frame(node: &SharedNode, frame: Bytes) -> Vec<Bytes> {
    let record: DirectoryRecord = match serde_json::from_slice(&frame) {
        Ok(record) => record,
        Err(e) => {
            warn!("Ignoring malformed broadcast: {}", e);
            return Vec::new();
        }
    };

    let from = record.address().clone();
    let outcome = match node.lock().register(record) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Failed to register broadcast from {}: {}", from.short(), e);
            return Vec::new();
        }
    };

    let mut out = Vec::with_capacity(2);
    if let Some(announcement) = outcome.announcement {
        match serde_json::to_vec(&announcement) {
            Ok(encoded) => out.push(Bytes::from(encoded)),
            Err(e) => error!("Failed to encode local record: {}", e),
        }
    }
    if outcome.accepted {
        debug!("Flooding broadcast from {}", from.short());
        out.push(frame);
    }
    out
}
