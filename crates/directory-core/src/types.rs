//! Wire types for the overlay directory
//!
//! Field names follow the JSON shape exchanged with peers and the relay
//! process. Anything that gets signed goes through [`crate::canonical`]
//! first, so struct field order here carries no meaning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ADDRESS
// =============================================================================

/// Node address: hex(SHA-256(SPKI-DER public key))
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Borrow the hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// DIRECTORY RECORD
// =============================================================================

/// Opaque record version id, only ever compared for equality
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct VersionId(pub String);

impl VersionId {
    /// Fresh random id (UUID v4, lowercase hyphenated)
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Signed portion of a directory record.
///
/// Fields hold exactly what the signer sent, so re-encoding them reproduces
/// the signed bytes. Records generated locally list neighbors sorted and
/// deduplicated; foreign records keep whatever order they were signed in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordData {
    #[serde(rename = "uuid")]
    pub version_id: VersionId,
    pub address: Address,
    pub neighbors: Vec<Address>,
}

/// A node's signed claim of its neighbor set
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    pub data: RecordData,
    /// Signer's SPKI public key, PEM encoded
    pub public_key: String,
    /// Hex of the DER-encoded ECDSA signature over canonical_bytes(data)
    pub signature: String,
}

// =============================================================================
// GRAPH SNAPSHOT
// =============================================================================

/// Signed export of a node's whole graph, served to bootstrapping peers
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub graph: BTreeMap<Address, DirectoryRecord>,
    /// Address of the exporting node
    pub local_address: Address,
    /// Exporter's SPKI public key, PEM encoded
    pub public_key: String,
    /// Hex of the DER-encoded ECDSA signature over canonical_bytes(graph)
    pub signature: String,
}
