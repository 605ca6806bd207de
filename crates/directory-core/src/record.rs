//! Signed adjacency records

use crate::canonical::canonical_bytes;
use crate::crypto::{check_signature, IdentityKeys};
use crate::error::Result;
use crate::types::{Address, DirectoryRecord, RecordData, VersionId};
use std::collections::BTreeSet;

impl DirectoryRecord {
    /// Create and sign a record with a fresh version id.
    ///
    /// `sign_bytes = canonical_bytes({uuid, address, neighbors})`
    pub fn generate(
        address: Address,
        neighbors: impl IntoIterator<Item = Address>,
        identity: &IdentityKeys,
    ) -> Result<Self> {
        let neighbors: BTreeSet<Address> = neighbors.into_iter().collect();
        let data = RecordData {
            version_id: VersionId::random(),
            address,
            neighbors: neighbors.into_iter().collect(),
        };

        let signature = identity.sign(&canonical_bytes(&data)?);

        Ok(Self {
            data,
            public_key: identity.public_key_pem().to_string(),
            signature,
        })
    }

    /// Check the signature against the embedded public key.
    ///
    /// The signed bytes are the canonical form of `data` as received, with
    /// neighbors in their listed order. Does not check that `address` is
    /// derived from that key.
    pub fn check_signature(&self) -> Result<()> {
        let bytes = canonical_bytes(&self.data)?;
        check_signature(&bytes, &self.signature, &self.public_key)
    }

    /// Boolean form of [`DirectoryRecord::check_signature`].
    pub fn verify(&self) -> bool {
        self.check_signature().is_ok()
    }

    pub fn address(&self) -> &Address {
        &self.data.address
    }

    pub fn version_id(&self) -> &VersionId {
        &self.data.version_id
    }

    /// Neighbors in signed order
    pub fn neighbors(&self) -> &[Address] {
        &self.data.neighbors
    }

    /// Neighbors as a set
    pub fn neighbor_set(&self) -> BTreeSet<Address> {
        self.data.neighbors.iter().cloned().collect()
    }

    /// Whether this record claims `address` as a neighbor
    pub fn lists(&self, address: &Address) -> bool {
        self.data.neighbors.contains(address)
    }
}
