//! # Storage Backends
//!
//! The network can live in one of two stores:
//! - `InMemory`: uses the in-memory [`Graph`] (fast, volatile)
//! - `Persistent`: uses [`RedbGraph`] for disk-backed ACID storage
//!
//! [`StorageBackend`] wraps either one and forwards every `GraphStore` call,
//! so the rest of the core never needs to know which store it is talking to.

mod redb_graph;

pub use redb_graph::RedbGraph;

use crate::graph::{Commit, Graph, GraphStore};
use crate::{
    Edge, Event, EventKind, MeridianError, Mover, MoverId, NewMover, NewNode, Node, NodeId,
    Timestamp,
};
use std::path::Path;

/// Storage backend for a network.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(Graph),
    /// Disk-backed graph using redb (ACID, persistent).
    Persistent(RedbGraph),
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbGraph (database handle) cannot be safely cloned.

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Graph::new())
    }
}

impl StorageBackend {
    /// Open or create a redb database at the given path.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, MeridianError> {
        Ok(Self::Persistent(RedbGraph::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn store(&self) -> &dyn GraphStore {
        match self {
            Self::InMemory(graph) => graph,
            Self::Persistent(redb) => redb,
        }
    }

    fn store_mut(&mut self) -> &mut dyn GraphStore {
        match self {
            Self::InMemory(graph) => graph,
            Self::Persistent(redb) => redb,
        }
    }
}

impl GraphStore for StorageBackend {
    fn insert_node(&mut self, node: NewNode) -> Result<Node, MeridianError> {
        self.store_mut().insert_node(node)
    }

    fn insert_edge(&mut self, a: NodeId, b: NodeId) -> Result<Edge, MeridianError> {
        self.store_mut().insert_edge(a, b)
    }

    fn lookup_node(&self, id: NodeId) -> Result<Option<Node>, MeridianError> {
        self.store().lookup_node(id)
    }

    fn nodes(&self) -> Result<Vec<Node>, MeridianError> {
        self.store().nodes()
    }

    fn edges(&self) -> Result<Vec<Edge>, MeridianError> {
        self.store().edges()
    }

    fn node_count(&self) -> Result<usize, MeridianError> {
        self.store().node_count()
    }

    fn edge_count(&self) -> Result<usize, MeridianError> {
        self.store().edge_count()
    }

    fn insert_mover(&mut self, mover: NewMover) -> Result<Mover, MeridianError> {
        self.store_mut().insert_mover(mover)
    }

    fn lookup_mover(&self, id: MoverId) -> Result<Option<Mover>, MeridianError> {
        self.store().lookup_mover(id)
    }

    fn movers(&self) -> Result<Vec<Mover>, MeridianError> {
        self.store().movers()
    }

    fn mover_count(&self) -> Result<usize, MeridianError> {
        self.store().mover_count()
    }

    fn update_mover(&mut self, mover: &Mover) -> Result<(), MeridianError> {
        self.store_mut().update_mover(mover)
    }

    fn append_event(
        &mut self,
        kind: EventKind,
        message: &str,
        at: Timestamp,
    ) -> Result<Event, MeridianError> {
        self.store_mut().append_event(kind, message, at)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, MeridianError> {
        self.store().recent_events(limit)
    }

    fn clear(&mut self) -> Result<(), MeridianError> {
        self.store_mut().clear()
    }

    // Forwarded explicitly so the redb single-transaction override is used.
    fn commit_expansion(
        &mut self,
        node: NewNode,
        connect_hint: Option<&str>,
    ) -> Result<Commit, MeridianError> {
        self.store_mut().commit_expansion(node, connect_hint)
    }
}
