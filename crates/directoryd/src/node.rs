//! Directory node: identity + graph behind the gossip and bootstrap surface

use directory_core::{Address, DirectoryRecord, GraphSnapshot, IdentityKeys, NetworkGraph};
use directory_net::{GraphFetcher, NeighborTable};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bootstrap errors
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("No neighbors configured")]
    NoNeighbors,
    #[error("Failed to get a verifiable network graph from any of {attempted} neighbors")]
    Exhausted { attempted: usize },
    #[error("Graph error: {0}")]
    Graph(#[from] directory_core::Error),
}

/// Node shared between the relay loop and the HTTP export
pub type SharedNode = Arc<Mutex<DirectoryNode>>;

/// Node lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Ready,
    Bootstrapping,
}

/// Result of registering an inbound broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// The broadcast was new to us; the caller must re-flood it verbatim
    pub accepted: bool,
    /// Our re-signed record, to be sent before any re-flood
    pub announcement: Option<DirectoryRecord>,
}

/// Orchestrates identity and graph for one overlay node
pub struct DirectoryNode {
    identity: Arc<IdentityKeys>,
    neighbors: NeighborTable,
    graph: NetworkGraph,
    phase: NodePhase,
}

impl DirectoryNode {
    /// Create a node whose record lists the configured neighbors
    pub fn new(identity: Arc<IdentityKeys>, neighbors: NeighborTable) -> directory_core::Result<Self> {
        let graph = NetworkGraph::new(identity.clone(), neighbors.addresses().cloned())?;

        Ok(Self {
            identity,
            neighbors,
            graph,
            phase: NodePhase::Ready,
        })
    }

    pub fn local_address(&self) -> &Address {
        self.identity.address()
    }

    pub fn has_neighbors(&self) -> bool {
        !self.neighbors.is_empty()
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    /// Handle an inbound broadcast.
    ///
    /// Unverifiable records are dropped before they can touch our adjacency.
    /// Otherwise adjacency is reconciled first (possibly yielding an
    /// announcement), then the record is merged.
    pub fn register(&mut self, record: DirectoryRecord) -> directory_core::Result<RegisterOutcome> {
        if let Err(e) = record.check_signature() {
            debug!("Discarding broadcast for {}: {}", record.address().short(), e);
            return Ok(RegisterOutcome {
                accepted: false,
                announcement: None,
            });
        }

        let announcement = if self.graph.check_adjacency(&record)? {
            let stats = self.graph.stats();
            info!(
                "Local adjacency changed after {} (degree {})",
                record.address().short(),
                stats.local_degree
            );
            Some(self.export_neighborhood())
        } else {
            None
        };

        let accepted = self.graph.update_adjacency_list(record);

        Ok(RegisterOutcome {
            accepted,
            announcement,
        })
    }

    /// Our own record
    pub fn export_neighborhood(&self) -> DirectoryRecord {
        self.graph.local_record().clone()
    }

    /// The whole graph, freshly signed, for bootstrap responses
    pub fn export_graph(&self) -> directory_core::Result<GraphSnapshot> {
        self.graph.sign_snapshot()
    }

    /// Check a snapshot's exporter address and signature
    pub fn verify_graph(snapshot: &GraphSnapshot) -> bool {
        match snapshot.check() {
            Ok(()) => true,
            Err(e) => {
                debug!("Graph from {} failed verification: {}", snapshot.local_address.short(), e);
                false
            }
        }
    }

    /// Replace our graph with a verified snapshot, keeping our own record
    pub fn adopt_graph(&mut self, snapshot: GraphSnapshot) -> Result<(), BootstrapError> {
        self.graph.replace_records(snapshot.graph)?;
        self.phase = NodePhase::Ready;
        Ok(())
    }

    /// Enter the bootstrapping phase, returning the neighbors to try
    pub fn begin_bootstrap(&mut self) -> NeighborTable {
        self.phase = NodePhase::Bootstrapping;
        self.neighbors.clone()
    }

    /// Leave the bootstrapping phase without adopting anything
    pub fn abort_bootstrap(&mut self) {
        self.phase = NodePhase::Ready;
    }

    /// Bootstrap from the first neighbor whose graph verifies.
    pub async fn request_remote_graph<F: GraphFetcher>(
        &mut self,
        fetcher: &F,
        route: &str,
    ) -> Result<(), BootstrapError> {
        let neighbors = self.begin_bootstrap();
        let fetched = fetch_verified_graph(&neighbors, fetcher, route).await;

        match fetched {
            Ok(snapshot) => self.adopt_graph(snapshot),
            Err(e) => {
                self.abort_bootstrap();
                Err(e)
            }
        }
    }
}

/// Bootstrap a node that is already shared with the HTTP export.
///
/// The lock is taken only to enter the phase and to adopt the winning
/// graph, so the node keeps serving its export while fetches are in flight.
pub async fn bootstrap_shared<F: GraphFetcher>(
    node: &SharedNode,
    fetcher: &F,
    route: &str,
) -> Result<(), BootstrapError> {
    let neighbors = node.lock().begin_bootstrap();
    let fetched = fetch_verified_graph(&neighbors, fetcher, route).await;

    let mut node = node.lock();
    match fetched {
        Ok(snapshot) => node.adopt_graph(snapshot),
        Err(e) => {
            node.abort_bootstrap();
            Err(e)
        }
    }
}

/// Try neighbors strictly in order; return the first snapshot that verifies.
///
/// Fetch errors, unparsable bodies and failed verification are logged and
/// move on to the next neighbor.
pub async fn fetch_verified_graph<F: GraphFetcher>(
    neighbors: &NeighborTable,
    fetcher: &F,
    route: &str,
) -> Result<GraphSnapshot, BootstrapError> {
    if neighbors.is_empty() {
        return Err(BootstrapError::NoNeighbors);
    }

    let mut attempted = 0;
    for neighbor in neighbors {
        attempted += 1;
        info!("Requesting network graph from {}", neighbor);

        let body = match fetcher.fetch_graph(neighbor, route).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Error requesting network graph from {}: {}", neighbor, e);
                continue;
            }
        };

        let snapshot: GraphSnapshot = match serde_json::from_str(&body) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Unparsable network graph from {}: {}", neighbor, e);
                continue;
            }
        };

        if let Err(e) = snapshot.check() {
            warn!("Rejected network graph from {}: {}", neighbor, e);
            continue;
        }

        info!(
            "Remote network graph received from {} ({} records)",
            neighbor,
            snapshot.graph.len()
        );
        return Ok(snapshot);
    }

    Err(BootstrapError::Exhausted { attempted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory_net::{FetchError, Neighbor};
    use std::collections::HashMap;
    use std::future::Future;

    enum Reply {
        Body(String),
        Status(u16),
    }

    /// Serves canned bodies keyed by neighbor address; anything else times out
    #[derive(Default)]
    struct ScriptedFetcher {
        replies: HashMap<Address, Reply>,
        attempts: Mutex<Vec<Address>>,
        /// Node whose phase is sampled on every fetch
        watched: Option<SharedNode>,
        phases: Mutex<Vec<NodePhase>>,
    }

    impl ScriptedFetcher {
        fn reply(mut self, address: &Address, reply: Reply) -> Self {
            self.replies.insert(address.clone(), reply);
            self
        }

        fn attempts(&self) -> Vec<Address> {
            self.attempts.lock().clone()
        }
    }

    impl GraphFetcher for ScriptedFetcher {
        fn fetch_graph(
            &self,
            neighbor: &Neighbor,
            route: &str,
        ) -> impl Future<Output = Result<String, FetchError>> + Send {
            self.attempts.lock().push(neighbor.address.clone());
            if let Some(node) = &self.watched {
                self.phases.lock().push(node.lock().phase());
            }
            let url = neighbor.graph_url(route);
            let result = match self.replies.get(&neighbor.address) {
                Some(Reply::Body(body)) => Ok(body.clone()),
                Some(Reply::Status(status)) => Err(FetchError::Status { url, status: *status }),
                None => Err(FetchError::Timeout { url }),
            };
            async move { result }
        }
    }

    fn identity() -> Arc<IdentityKeys> {
        Arc::new(IdentityKeys::generate().unwrap())
    }

    fn neighbor(address: &Address) -> Neighbor {
        Neighbor {
            address: address.clone(),
            hostname: "127.0.0.1".into(),
            port: 9,
        }
    }

    fn node(neighbors: &[&Address]) -> DirectoryNode {
        let table = NeighborTable::new(neighbors.iter().map(|a| neighbor(a)).collect());
        DirectoryNode::new(identity(), table).unwrap()
    }

    /// A node that knows one extra record, exported as JSON
    fn populated_export() -> (DirectoryNode, Address, String) {
        let mut exporter = node(&[]);
        let other = identity();
        let record = DirectoryRecord::generate(other.address().clone(), Vec::<Address>::new(), &other).unwrap();
        assert!(exporter.register(record).unwrap().accepted);

        let json = serde_json::to_string(&exporter.export_graph().unwrap()).unwrap();
        (exporter, other.address().clone(), json)
    }

    #[test]
    fn test_register_floods_once() {
        let mut a = node(&[]);
        let other = identity();
        let record = DirectoryRecord::generate(other.address().clone(), Vec::<Address>::new(), &other).unwrap();

        let first = a.register(record.clone()).unwrap();
        assert!(first.accepted);
        assert!(first.announcement.is_none());

        let second = a.register(record).unwrap();
        assert!(!second.accepted);
    }

    #[test]
    fn test_register_announces_adjacency_change() {
        let mut a = node(&[]);
        let b = identity();
        let claims_a = DirectoryRecord::generate(b.address().clone(), vec![a.local_address().clone()], &b).unwrap();

        let outcome = a.register(claims_a).unwrap();
        assert!(outcome.accepted);

        let announcement = outcome.announcement.unwrap();
        assert_eq!(announcement, a.export_neighborhood());
        assert!(announcement.lists(b.address()));
        assert!(announcement.verify());
    }

    #[test]
    fn test_register_discards_forged_record() {
        let mut a = node(&[]);
        let b = identity();
        let mut forged = DirectoryRecord::generate(b.address().clone(), vec![a.local_address().clone()], &b).unwrap();
        forged.signature = "3006020101020101".into();

        let before = a.export_neighborhood();
        let outcome = a.register(forged).unwrap();
        assert_eq!(outcome, RegisterOutcome { accepted: false, announcement: None });
        assert_eq!(a.export_neighborhood(), before);
    }

    #[test]
    fn test_nodes_converge() {
        let mut a = node(&[]);
        let mut b = node(&[]);

        // B starts claiming A; A learns it and answers with its announcement
        let a_addr = a.local_address().clone();
        let b_claim = b.graph.regenerate_local(vec![a_addr]).unwrap().clone();

        let at_a = a.register(b_claim).unwrap();
        let a_announcement = at_a.announcement.unwrap();

        let at_b = b.register(a_announcement).unwrap();
        assert!(at_b.accepted);
        assert!(at_b.announcement.is_none());

        assert_eq!(
            a.graph().local_adjacency_list().iter().collect::<Vec<_>>(),
            vec![b.local_address()]
        );
        assert_eq!(
            b.graph().local_adjacency_list().iter().collect::<Vec<_>>(),
            vec![a.local_address()]
        );
    }

    #[test]
    fn test_export_graph_verifies() {
        let (exporter, other, json) = populated_export();
        let snapshot: GraphSnapshot = serde_json::from_str(&json).unwrap();

        assert!(DirectoryNode::verify_graph(&snapshot));
        assert_eq!(&snapshot.local_address, exporter.local_address());
        assert!(snapshot.graph.contains_key(&other));
        assert!(snapshot.graph.contains_key(exporter.local_address()));
    }

    #[test]
    fn test_verify_graph_rejects_forged_address() {
        let (_exporter, _other, json) = populated_export();
        let mut snapshot: GraphSnapshot = serde_json::from_str(&json).unwrap();
        snapshot.local_address = identity().address().clone();

        assert!(snapshot.graph.values().all(DirectoryRecord::verify));
        assert!(!DirectoryNode::verify_graph(&snapshot));
    }

    #[tokio::test]
    async fn test_bootstrap_failover() {
        let n1: Address = "n1".into();
        let n2 = identity().address().clone();
        let (exporter, known, good_json) = populated_export();
        let n3 = exporter.local_address().clone();
        let n4: Address = "n4".into();

        // n2 serves a graph whose signature no longer covers its contents
        let (_, _, bad_json) = populated_export();
        let mut bad: GraphSnapshot = serde_json::from_str(&bad_json).unwrap();
        bad.graph.clear();
        let bad_json = serde_json::to_string(&bad).unwrap();

        let fetcher = ScriptedFetcher::default()
            .reply(&n2, Reply::Body(bad_json))
            .reply(&n3, Reply::Body(good_json))
            .reply(&n4, Reply::Body("unused".into()));

        let mut a = node(&[&n1, &n2, &n3, &n4]);
        let before = a.export_neighborhood();

        a.request_remote_graph(&fetcher, "/get_network_graph").await.unwrap();

        assert_eq!(fetcher.attempts(), vec![n1, n2, n3.clone()]);
        assert_eq!(a.phase(), NodePhase::Ready);
        assert!(a.graph().record(&known).is_some());
        assert!(a.graph().record(&n3).is_some());

        // Our record survives adoption, re-signed with the same neighbors
        let after = a.export_neighborhood();
        assert_ne!(after.version_id(), before.version_id());
        assert_eq!(after.neighbors(), before.neighbors());
        assert!(after.verify());
    }

    #[tokio::test]
    async fn test_bootstrap_skips_bad_status_and_garbage() {
        let n1: Address = "n1".into();
        let n2: Address = "n2".into();
        let fetcher = ScriptedFetcher::default()
            .reply(&n1, Reply::Status(500))
            .reply(&n2, Reply::Body("{ not json".into()));

        let mut a = node(&[&n1, &n2]);
        let before = a.export_neighborhood();

        let err = a.request_remote_graph(&fetcher, "/g").await.unwrap_err();
        assert!(matches!(err, BootstrapError::Exhausted { attempted: 2 }));
        assert_eq!(fetcher.attempts().len(), 2);
        assert_eq!(a.phase(), NodePhase::Ready);
        assert_eq!(a.export_neighborhood(), before);
        assert_eq!(a.graph().stats().records, 1);
    }

    #[tokio::test]
    async fn test_bootstrap_without_neighbors() {
        let mut a = node(&[]);
        let fetcher = ScriptedFetcher::default();

        let err = a.request_remote_graph(&fetcher, "/g").await.unwrap_err();
        assert!(matches!(err, BootstrapError::NoNeighbors));
        assert!(fetcher.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_shared_bootstrap_phase_visible() {
        let (exporter, known, good_json) = populated_export();
        let n1: Address = "n1".into();
        let n2 = exporter.local_address().clone();

        let shared: SharedNode = Arc::new(Mutex::new(node(&[&n1, &n2])));
        let mut fetcher = ScriptedFetcher::default().reply(&n2, Reply::Body(good_json));
        fetcher.watched = Some(shared.clone());

        assert_eq!(shared.lock().phase(), NodePhase::Ready);
        bootstrap_shared(&shared, &fetcher, "/g").await.unwrap();

        assert_eq!(
            *fetcher.phases.lock(),
            vec![NodePhase::Bootstrapping, NodePhase::Bootstrapping]
        );
        assert_eq!(shared.lock().phase(), NodePhase::Ready);
        assert!(shared.lock().graph().record(&known).is_some());
    }

    #[tokio::test]
    async fn test_shared_bootstrap_failure_returns_to_ready() {
        let n1: Address = "n1".into();
        let shared: SharedNode = Arc::new(Mutex::new(node(&[&n1])));
        let mut fetcher = ScriptedFetcher::default();
        fetcher.watched = Some(shared.clone());

        let err = bootstrap_shared(&shared, &fetcher, "/g").await.unwrap_err();
        assert!(matches!(err, BootstrapError::Exhausted { attempted: 1 }));
        assert_eq!(*fetcher.phases.lock(), vec![NodePhase::Bootstrapping]);
        assert_eq!(shared.lock().phase(), NodePhase::Ready);
    }
}
