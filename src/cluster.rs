//! In-Process Cluster
//!
//! [`MemoryCluster`] runs several store nodes inside the current process and
//! implements [`Transport`] for them, so the whole client stack (adapter,
//! cursor, RESP client, translator) can be exercised without a network.
//!
//! ```text
//!   RespClient ──request(key, frame)──> MemoryCluster
//!                                           │ route by key
//!                    ┌──────────────────────┼──────────────────────┐
//!                    ▼                      ▼                      ▼
//!               ┌─────────┐            ┌─────────┐            ┌─────────┐
//!               │ Node 0  │            │ Node 1  │            │ Node N  │
//!               │ Handler │            │ Handler │            │ Handler │
//!               │  Store  │            │  Store  │            │  Store  │
//!               └─────────┘            └─────────┘            └─────────┘
//! ```
//!
//! Every request and reply is serialized to RESP bytes and parsed back, the
//! same work a socket round trip would do. Keys with a `{hash tag}` are
//! routed by the tag only, so related keys can be kept on one node.

use crate::client::{RespClient, Transport};
use crate::commands::NodeHandler;
use crate::connection::ClusterConnection;
use crate::error::StoreResult;
use crate::protocol::{decode_frame, RespValue};
use crate::storage::{HashStore, StoreStats, DEFAULT_SHARDS};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Cluster shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Number of store nodes
    pub nodes: usize,
    /// Number of lock shards inside each node's store
    pub shards_per_node: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: 3,
            shards_per_node: DEFAULT_SHARDS,
        }
    }
}

impl ClusterConfig {
    /// Clamps zero values to 1.
    fn normalized(self) -> Self {
        Self {
            nodes: self.nodes.max(1),
            shards_per_node: self.shards_per_node.max(1),
        }
    }
}

/// Request statistics for a cluster.
#[derive(Debug, Default)]
pub struct ClusterStats {
    /// Requests that reached a node
    pub requests: AtomicU64,
    /// Requests rejected because the cluster was unreachable
    pub refused: AtomicU64,
    /// Command bytes sent to nodes
    pub bytes_sent: AtomicU64,
    /// Reply bytes received from nodes
    pub bytes_received: AtomicU64,
}

impl ClusterStats {
    fn request(&self, sent: usize, received: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(received as u64, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct Node {
    handler: NodeHandler,
}

/// A set of in-process store nodes behind one [`Transport`].
#[derive(Debug)]
pub struct MemoryCluster {
    config: ClusterConfig,
    nodes: Vec<Node>,
    stats: ClusterStats,
    unreachable: AtomicBool,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCluster {
    /// Creates a cluster with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ClusterConfig::default())
    }

    pub fn with_config(config: ClusterConfig) -> Self {
        let config = config.normalized();
        let nodes = (0..config.nodes)
            .map(|_| Node {
                handler: NodeHandler::new(Arc::new(HashStore::with_shards(
                    config.shards_per_node,
                ))),
            })
            .collect();

        Self {
            config,
            nodes,
            stats: ClusterStats::default(),
            unreachable: AtomicBool::new(false),
        }
    }

    /// A connection using a [`RespClient`] over this cluster.
    pub fn connect(&self) -> ClusterConnection<RespClient<&Self>> {
        ClusterConnection::new(RespClient::new(self))
    }

    pub fn config(&self) -> ClusterConfig {
        self.config
    }

    /// Index of the node that owns `key`.
    pub fn node_for(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        routing_key(key).hash(&mut hasher);
        (hasher.finish() as usize) % self.nodes.len()
    }

    /// The store of node `index`, if it exists.
    pub fn node_store(&self, index: usize) -> Option<&Arc<HashStore>> {
        self.nodes.get(index).map(|node| node.handler.storage())
    }

    /// While set, every request fails as if the connection was refused.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of requests that reached a node.
    pub fn requests(&self) -> u64 {
        self.stats.requests.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &ClusterStats {
        &self.stats
    }

    /// Store statistics summed over all nodes.
    pub fn store_stats(&self) -> StoreStats {
        self.nodes
            .iter()
            .map(|node| node.handler.storage().stats())
            .fold(StoreStats::default(), |acc, s| StoreStats {
                keys: acc.keys + s.keys,
                read_ops: acc.read_ops + s.read_ops,
                write_ops: acc.write_ops + s.write_ops,
            })
    }
}

impl Transport for MemoryCluster {
    fn request(&self, key: &[u8], command: RespValue) -> StoreResult<RespValue> {
        let node = self.node_for(key);

        if self.unreachable.load(Ordering::SeqCst) {
            self.stats.refused.fetch_add(1, Ordering::Relaxed);
            warn!(node, "cluster node unreachable");
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("node {} refused the connection", node),
            )
            .into());
        }

        let sent = command.serialize();
        let received = self.nodes[node]
            .handler
            .execute(decode_frame(&sent)?)
            .serialize();
        self.stats.request(sent.len(), received.len());

        trace!(
            node,
            sent = sent.len(),
            received = received.len(),
            "node round trip"
        );
        Ok(decode_frame(&received)?)
    }
}

/// The part of `key` used for routing: the contents of the first non-empty
/// `{...}` section, or the whole key.
pub fn routing_key(key: &[u8]) -> &[u8] {
    let Some(open) = key.iter().position(|&b| b == b'{') else {
        return key;
    };
    match key[open + 1..].iter().position(|&b| b == b'}') {
        Some(len) if len > 0 => &key[open + 1..open + 1 + len],
        _ => key,
    }
}
