//! Directory core library
//!
//! This crate provides the authenticated topology model for the overlay
//! directory: node addresses, signed adjacency records and the network graph
//! that merges them.
//!
//! # Modules
//!
//! - [`types`]: Wire types (Address, DirectoryRecord, GraphSnapshot)
//! - [`canonical`]: Deterministic serialization for signing
//! - [`crypto`]: Identity keys, address derivation and signatures
//! - [`record`]: Signed record generation and verification
//! - [`graph`]: Address-keyed graph with adjacency and merge rules
//! - [`error`]: Error types

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod graph;
pub mod record;
pub mod types;

#[cfg(test)]
mod test_vectors;

pub use crypto::IdentityKeys;
pub use error::{Error, Result};
pub use graph::{GraphStats, NetworkGraph};
pub use types::*;
