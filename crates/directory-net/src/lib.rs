//! Networking for the overlay directory
//!
//! This crate provides:
//! - Length-prefixed framing for the relay link
//! - The duplex relay link (inbound broadcasts, outbound queue)
//! - The configured neighbor table
//! - Bootstrap graph fetching over HTTP

pub mod fetch;
pub mod framing;
pub mod peer;
pub mod relay;

pub use fetch::{FetchError, GraphFetcher, HttpGraphFetcher};
pub use framing::{FrameCodec, FrameError};
pub use peer::{Neighbor, NeighborTable};
pub use relay::{RelayError, RelayReceiver, RelaySender};
