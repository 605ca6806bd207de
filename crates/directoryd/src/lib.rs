//! directoryd - overlay directory daemon
//!
//! This daemon provides:
//! - An authenticated view of the overlay topology
//! - Adjacency gossip over the local relay link
//! - Bootstrap from a neighbor's signed graph export
//! - HTTP export of the local graph

pub mod config;
pub mod http;
pub mod node;
pub mod server;

pub use config::{Config, NodeConfig};
pub use http::build_router;
pub use node::{BootstrapError, DirectoryNode, NodePhase, RegisterOutcome, SharedNode};
pub use server::Server;
