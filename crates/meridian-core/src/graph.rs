//! # Graph Store
//!
//! The storage contract for the Meridian network and its in-memory backend.
//!
//! This module implements the `GraphStore` trait.
//! All data structures use `BTreeMap` for deterministic ordering, so every
//! listing comes back sorted by identifier (which is also creation order).

use crate::primitives::MAX_EVENT_LIMIT;
use crate::{
    Edge, EdgeId, Event, EventId, EventKind, MeridianError, Mover, MoverId, NewMover, NewNode,
    Node, NodeId, Snapshot, Timestamp,
};
use std::collections::BTreeMap;

// =============================================================================
// CONNECTION RESOLUTION
// =============================================================================

/// Where a newly committed node gets attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Node to connect to, `None` when the store held no nodes at all.
    pub target: Option<NodeId>,
    /// The requested identifier was unusable and the fallback rule applied.
    pub fell_back: bool,
}

/// Resolve a raw, untrusted `connect_to` hint against the existing node ids.
///
/// The hint is honoured only if it parses as an integer naming an existing
/// node. Otherwise the new node is attached to the second most recently
/// created node, or to the only node when just one exists.
#[must_use]
pub fn resolve_connection(hint: Option<&str>, existing: &[NodeId]) -> Connection {
    let requested = hint
        .map(str::trim)
        .and_then(|h| h.parse::<u64>().ok())
        .map(NodeId)
        .filter(|id| existing.contains(id));

    match requested {
        Some(id) => Connection {
            target: Some(id),
            fell_back: false,
        },
        None => Connection {
            target: fallback_connection(existing),
            fell_back: true,
        },
    }
}

/// Second most recently created node, or the sole node if only one exists.
#[must_use]
pub fn fallback_connection(existing: &[NodeId]) -> Option<NodeId> {
    let mut ids = existing.to_vec();
    ids.sort_unstable();
    ids.iter().rev().nth(1).or(ids.first()).copied()
}

/// Result of an atomic EXECUTE-phase commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub node: Node,
    pub edge: Option<Edge>,
    pub connection: Connection,
}

pub(crate) fn construction_message(node: &Node, connection: Connection) -> String {
    let position = format!("({:.1}, {:.1})", node.position.x, node.position.y);
    match connection.target {
        Some(target) if connection.fell_back => format!(
            "Built {} {} at {}, linked to {} (fallback)",
            node.name, node.id, position, target
        ),
        Some(target) => format!(
            "Built {} {} at {}, linked to {}",
            node.name, node.id, position, target
        ),
        None => format!("Built {} {} at {}, unlinked", node.name, node.id, position),
    }
}

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// The GraphStore trait defines durable CRUD over nodes, edges, movers, and events.
///
/// Every mutation must be persisted before the call returns. Listings are
/// ordered by identifier. Implementations must be `Send + Sync` so the store
/// can sit behind a shared lock.
pub trait GraphStore: Send + Sync {
    /// Insert a node and return it with its assigned identifier.
    fn insert_node(&mut self, node: NewNode) -> Result<Node, MeridianError>;

    /// Insert an undirected edge between two distinct existing nodes.
    /// If the edge already exists, the existing edge is returned.
    fn insert_edge(&mut self, a: NodeId, b: NodeId) -> Result<Edge, MeridianError>;

    /// Lookup a node by identifier.
    fn lookup_node(&self, id: NodeId) -> Result<Option<Node>, MeridianError>;

    /// All nodes, oldest first.
    fn nodes(&self) -> Result<Vec<Node>, MeridianError>;

    /// All edges, oldest first.
    fn edges(&self) -> Result<Vec<Edge>, MeridianError>;

    fn node_count(&self) -> Result<usize, MeridianError>;

    fn edge_count(&self) -> Result<usize, MeridianError>;

    /// Insert an idle mover parked at an existing node.
    fn insert_mover(&mut self, mover: NewMover) -> Result<Mover, MeridianError>;

    fn lookup_mover(&self, id: MoverId) -> Result<Option<Mover>, MeridianError>;

    /// All movers, oldest first.
    fn movers(&self) -> Result<Vec<Mover>, MeridianError>;

    fn mover_count(&self) -> Result<usize, MeridianError>;

    /// Overwrite the stored state of an existing mover.
    fn update_mover(&mut self, mover: &Mover) -> Result<(), MeridianError>;

    /// Append an audit event.
    fn append_event(
        &mut self,
        kind: EventKind,
        message: &str,
        at: Timestamp,
    ) -> Result<Event, MeridianError>;

    /// Up to `limit` events, newest first.
    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, MeridianError>;

    /// Remove every node, edge, mover, and event. Identifier counters keep
    /// growing so stale identifiers are never reused.
    fn clear(&mut self) -> Result<(), MeridianError>;

    /// The `limit` most recently created nodes, oldest first.
    fn recent_nodes(&self, limit: usize) -> Result<Vec<Node>, MeridianError> {
        let mut nodes = self.nodes()?;
        let skip = nodes.len().saturating_sub(limit);
        Ok(nodes.split_off(skip))
    }

    /// Commit a new node, its connecting edge, and a construction event.
    ///
    /// The connection hint is resolved against the node set as it stands
    /// at the start of this call, so the fallback target is always taken from
    /// one consistent view of the store.
    fn commit_expansion(
        &mut self,
        node: NewNode,
        connect_hint: Option<&str>,
    ) -> Result<Commit, MeridianError> {
        let existing: Vec<NodeId> = self.nodes()?.iter().map(|n| n.id).collect();
        let connection = resolve_connection(connect_hint, &existing);

        let node = self.insert_node(node)?;
        let edge = match connection.target {
            Some(target) => Some(self.insert_edge(target, node.id)?),
            None => None,
        };
        self.append_event(
            EventKind::Construction,
            &construction_message(&node, connection),
            node.created_at,
        )?;

        Ok(Commit {
            node,
            edge,
            connection,
        })
    }

    /// Full read view for rendering.
    fn snapshot(&self, event_limit: usize) -> Result<Snapshot, MeridianError> {
        Ok(Snapshot {
            nodes: self.nodes()?,
            edges: self.edges()?,
            movers: self.movers()?,
            events: self.recent_events(event_limit)?,
        })
    }
}

/// Checks shared by every backend before an edge is written.
pub(crate) fn validate_edge<G: GraphStore + ?Sized>(
    store: &G,
    a: NodeId,
    b: NodeId,
) -> Result<(), MeridianError> {
    if a == b {
        return Err(MeridianError::Validation(format!(
            "edge endpoints must differ, got {} twice",
            a
        )));
    }
    for id in [a, b] {
        if store.lookup_node(id)?.is_none() {
            return Err(MeridianError::NodeNotFound(id));
        }
    }
    Ok(())
}

/// Checks shared by every backend before a mover is created.
pub(crate) fn validate_new_mover<G: GraphStore + ?Sized>(
    store: &G,
    mover: &NewMover,
) -> Result<(), MeridianError> {
    if store.lookup_node(mover.node)?.is_none() {
        return Err(MeridianError::NodeNotFound(mover.node));
    }
    if !(mover.speed_kmh.is_finite() && mover.speed_kmh > 0.0) {
        return Err(MeridianError::Validation(format!(
            "mover speed must be positive, got {}",
            mover.speed_kmh
        )));
    }
    Ok(())
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
/// Volatile: everything is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    /// Normalized endpoint pair -> edge
    edge_index: BTreeMap<(NodeId, NodeId), EdgeId>,
    movers: BTreeMap<MoverId, Mover>,
    events: BTreeMap<EventId, Event>,
    next_node_id: u64,
    next_edge_id: u64,
    next_mover_id: u64,
    next_event_id: u64,
}

impl Graph {
    /// Create a new empty graph. Identifiers start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_node_id: 1,
            next_edge_id: 1,
            next_mover_id: 1,
            next_event_id: 1,
            ..Self::default()
        }
    }

    fn take_id(counter: &mut u64) -> u64 {
        let id = (*counter).max(1);
        *counter = id.saturating_add(1);
        id
    }
}

impl GraphStore for Graph {
    fn insert_node(&mut self, node: NewNode) -> Result<Node, MeridianError> {
        let id = NodeId(Self::take_id(&mut self.next_node_id));
        let node = Node {
            id,
            name: node.name,
            position: node.position,
            created_at: node.created_at,
        };
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn insert_edge(&mut self, a: NodeId, b: NodeId) -> Result<Edge, MeridianError> {
        validate_edge(&*self, a, b)?;
        let key = Edge::endpoints(a, b);
        if let Some(edge) = self
            .edge_index
            .get(&key)
            .and_then(|id| self.edges.get(id))
        {
            return Ok(*edge);
        }

        let edge = Edge {
            id: EdgeId(Self::take_id(&mut self.next_edge_id)),
            a: key.0,
            b: key.1,
        };
        self.edges.insert(edge.id, edge);
        self.edge_index.insert(key, edge.id);
        Ok(edge)
    }

    fn lookup_node(&self, id: NodeId) -> Result<Option<Node>, MeridianError> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn nodes(&self) -> Result<Vec<Node>, MeridianError> {
        Ok(self.nodes.values().cloned().collect())
    }

    fn edges(&self) -> Result<Vec<Edge>, MeridianError> {
        Ok(self.edges.values().copied().collect())
    }

    fn node_count(&self) -> Result<usize, MeridianError> {
        Ok(self.nodes.len())
    }

    fn edge_count(&self) -> Result<usize, MeridianError> {
        Ok(self.edges.len())
    }

    fn insert_mover(&mut self, mover: NewMover) -> Result<Mover, MeridianError> {
        validate_new_mover(&*self, &mover)?;
        let id = MoverId(Self::take_id(&mut self.next_mover_id));
        let mover = Mover::parked(id, mover);
        self.movers.insert(id, mover.clone());
        Ok(mover)
    }

    fn lookup_mover(&self, id: MoverId) -> Result<Option<Mover>, MeridianError> {
        Ok(self.movers.get(&id).cloned())
    }

    fn movers(&self) -> Result<Vec<Mover>, MeridianError> {
        Ok(self.movers.values().cloned().collect())
    }

    fn mover_count(&self) -> Result<usize, MeridianError> {
        Ok(self.movers.len())
    }

    fn update_mover(&mut self, mover: &Mover) -> Result<(), MeridianError> {
        match self.movers.get_mut(&mover.id) {
            Some(slot) => {
                *slot = mover.clone();
                Ok(())
            }
            None => Err(MeridianError::MoverNotFound(mover.id)),
        }
    }

    fn append_event(
        &mut self,
        kind: EventKind,
        message: &str,
        at: Timestamp,
    ) -> Result<Event, MeridianError> {
        let event = Event {
            id: EventId(Self::take_id(&mut self.next_event_id)),
            kind,
            message: message.to_string(),
            at,
        };
        self.events.insert(event.id, event.clone());
        Ok(event)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, MeridianError> {
        Ok(self
            .events
            .values()
            .rev()
            .take(limit.min(MAX_EVENT_LIMIT))
            .cloned()
            .collect())
    }

    fn clear(&mut self) -> Result<(), MeridianError> {
        self.nodes.clear();
        self.edges.clear();
        self.edge_index.clear();
        self.movers.clear();
        self.events.clear();
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
