//! Authenticated network graph
//!
//! Maps every known address to the latest accepted [`DirectoryRecord`] for
//! it. The local node's own record is always present and is only ever
//! produced here, by re-signing with the local identity.

use crate::canonical::canonical_bytes;
use crate::crypto::{address_from_pem, check_signature, IdentityKeys};
use crate::error::{Error, Result};
use crate::types::{Address, DirectoryRecord, GraphSnapshot};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Address-keyed graph of signed adjacency records
pub struct NetworkGraph {
    identity: Arc<IdentityKeys>,
    local_address: Address,
    /// Our own record, re-signed on every adjacency change
    local: DirectoryRecord,
    /// Records for every other address
    remote: BTreeMap<Address, DirectoryRecord>,
}

impl NetworkGraph {
    /// Create a graph holding only our own record
    pub fn new(
        identity: Arc<IdentityKeys>,
        neighbors: impl IntoIterator<Item = Address>,
    ) -> Result<Self> {
        let local_address = identity.address().clone();
        let local = DirectoryRecord::generate(local_address.clone(), neighbors, &identity)?;

        Ok(Self {
            identity,
            local_address,
            local,
            remote: BTreeMap::new(),
        })
    }

    pub fn local_address(&self) -> &Address {
        &self.local_address
    }

    pub fn local_record(&self) -> &DirectoryRecord {
        &self.local
    }

    pub fn local_adjacency_list(&self) -> &[Address] {
        self.local.neighbors()
    }

    /// Look up the record stored for an address
    pub fn record(&self, address: &Address) -> Option<&DirectoryRecord> {
        if *address == self.local_address {
            Some(&self.local)
        } else {
            self.remote.get(address)
        }
    }

    /// All records, ours included, in address order
    pub fn records(&self) -> BTreeMap<Address, DirectoryRecord> {
        let mut all = self.remote.clone();
        all.insert(self.local_address.clone(), self.local.clone());
        all
    }

    /// Keep our adjacency symmetric with the node that sent `remote`.
    ///
    /// - remote lists us, we don't list remote: add remote
    /// - remote doesn't list us, we list remote: drop remote
    /// - otherwise nothing changes
    ///
    /// On change our record is re-signed under a fresh version id.
    /// Returns whether the local neighbor set changed.
    pub fn check_adjacency(&mut self, remote: &DirectoryRecord) -> Result<bool> {
        let remote_address = remote.address();
        if *remote_address == self.local_address {
            return Ok(false);
        }

        let mut neighbors = self.local.neighbor_set();
        match (
            remote.lists(&self.local_address),
            self.local.lists(remote_address),
        ) {
            (true, false) => {
                neighbors.insert(remote_address.clone());
                debug!("Adjacency gained {}", remote_address.short());
            }
            (false, true) => {
                neighbors.remove(remote_address);
                debug!("Adjacency lost {}", remote_address.short());
            }
            _ => return Ok(false),
        }

        self.regenerate_local(neighbors)?;
        Ok(true)
    }

    /// Merge a record into the graph.
    ///
    /// Returns `true` if the record was new or replaced a stored record with
    /// a different version id. Any differing id wins; there is no ordering
    /// between versions.
    pub fn update_adjacency_list(&mut self, record: DirectoryRecord) -> bool {
        if let Err(e) = record.check_signature() {
            debug!("Rejected record for {}: {}", record.address().short(), e);
            return false;
        }

        // Our own record only changes through check_adjacency/regenerate_local
        if *record.address() == self.local_address {
            return false;
        }

        match self.remote.entry(record.address().clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(mut slot) => {
                if slot.get().version_id() == record.version_id() {
                    return false;
                }
                slot.insert(record);
                true
            }
        }
    }

    /// Re-sign our record with a new neighbor set and version id
    pub fn regenerate_local(
        &mut self,
        neighbors: impl IntoIterator<Item = Address>,
    ) -> Result<&DirectoryRecord> {
        self.local =
            DirectoryRecord::generate(self.local_address.clone(), neighbors, &self.identity)?;
        Ok(&self.local)
    }

    /// Adopt a bootstrap graph wholesale, keeping our identity and neighbors.
    ///
    /// The adopted entry for our own address is discarded and our record is
    /// re-signed. Entries filed under a key other than their record's
    /// address are dropped.
    pub fn replace_records(&mut self, records: BTreeMap<Address, DirectoryRecord>) -> Result<()> {
        let neighbors = self.local.neighbor_set();

        self.remote = records
            .into_iter()
            .filter(|(key, record)| {
                if key != record.address() {
                    warn!(
                        "Dropping graph entry {} filed under {}",
                        record.address().short(),
                        key.short()
                    );
                    return false;
                }
                *key != self.local_address
            })
            .collect();

        self.regenerate_local(neighbors)?;
        Ok(())
    }

    /// Export the whole graph signed with our identity
    pub fn sign_snapshot(&self) -> Result<GraphSnapshot> {
        let graph = self.records();
        let signature = self.identity.sign(&canonical_bytes(&graph)?);

        Ok(GraphSnapshot {
            graph,
            local_address: self.local_address.clone(),
            public_key: self.identity.public_key_pem().to_string(),
            signature,
        })
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            records: self.remote.len() + 1,
            local_degree: self.local.neighbors().len(),
        }
    }
}

/// Graph statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStats {
    pub records: usize,
    pub local_degree: usize,
}

impl GraphSnapshot {
    /// Check that the exporter's key hashes to `local_address` and that
    /// `signature` covers `graph` under that key.
    pub fn check(&self) -> Result<()> {
        let computed = address_from_pem(&self.public_key)?;
        if computed != self.local_address {
            return Err(Error::AddressMismatch {
                computed: computed.0,
                claimed: self.local_address.0.clone(),
            });
        }

        let bytes = canonical_bytes(&self.graph)?;
        check_signature(&bytes, &self.signature, &self.public_key)
    }

    /// Boolean form of [`GraphSnapshot::check`].
    pub fn verify(&self) -> bool {
        self.check().is_ok()
    }
}
