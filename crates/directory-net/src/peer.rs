//! Configured neighbors
//!
//! The neighbor table is written as a JSON object keyed by address. Object
//! order is the bootstrap order, so it is deserialized into a list instead
//! of a map.

use directory_core::Address;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A directly connected peer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Neighbor {
    /// Peer's node address
    pub address: Address,
    /// Host serving the peer's graph export
    pub hostname: String,
    /// Port serving the peer's graph export
    pub port: u16,
}

impl Neighbor {
    /// URL of this neighbor's graph export under `route`
    pub fn graph_url(&self, route: &str) -> String {
        format!("http://{}:{}{}", self.hostname, self.port, route)
    }
}

impl fmt::Display for Neighbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.address.short(), self.hostname, self.port)
    }
}

#[derive(Serialize, Deserialize)]
struct Endpoint {
    hostname: String,
    port: u16,
}

/// Neighbors in configuration order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NeighborTable(Vec<Neighbor>);

impl NeighborTable {
    pub fn new(neighbors: Vec<Neighbor>) -> Self {
        Self(neighbors)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Neighbor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Neighbor addresses, in configuration order
    pub fn addresses(&self) -> impl Iterator<Item = &Address> + '_ {
        self.0.iter().map(|n| &n.address)
    }
}

impl<'a> IntoIterator for &'a NeighborTable {
    type Item = &'a Neighbor;
    type IntoIter = std::slice::Iter<'a, Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for NeighborTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for n in &self.0 {
            let endpoint = Endpoint {
                hostname: n.hostname.clone(),
                port: n.port,
            };
            map.serialize_entry(&n.address, &endpoint)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NeighborTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = NeighborTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of address to {hostname, port}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut neighbors: Vec<Neighbor> = Vec::with_capacity(map.size_hint().unwrap_or(0));

                while let Some((address, endpoint)) = map.next_entry::<Address, Endpoint>()? {
                    if neighbors.iter().any(|n| n.address == address) {
                        return Err(de::Error::custom(format!("duplicate neighbor {}", address)));
                    }
                    neighbors.push(Neighbor {
                        address,
                        hostname: endpoint.hostname,
                        port: endpoint.port,
                    });
                }

                Ok(NeighborTable(neighbors))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
