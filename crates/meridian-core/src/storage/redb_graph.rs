//! # redb-backed Graph Storage
//!
//! A disk-backed store using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! Every mutation runs in its own write transaction and is committed before
//! the call returns. `commit_expansion` groups the node, its edge, and the
//! construction event into one transaction, and resolves the connection hint
//! inside that same transaction.

use crate::graph::{Commit, GraphStore, construction_message, resolve_connection};
use crate::primitives::MAX_EVENT_LIMIT;
use crate::types::persistence;
use crate::{
    Edge, EdgeId, Event, EventId, EventKind, MeridianError, Mover, MoverId, NewMover, NewNode,
    Node, NodeId, Timestamp,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Tables keyed by a numeric identifier holding postcard-encoded records.
type BlobTable = TableDefinition<'static, u64, &'static [u8]>;

/// Table for nodes: NodeId(u64) -> serialized Node bytes
const NODES: BlobTable = TableDefinition::new("nodes");

/// Table for edges: EdgeId(u64) -> serialized Edge bytes
const EDGES: BlobTable = TableDefinition::new("edges");

/// Table for edge deduplication: normalized (a, b) -> EdgeId(u64)
const EDGE_INDEX: TableDefinition<(u64, u64), u64> = TableDefinition::new("edge_index");

/// Table for movers: MoverId(u64) -> serialized Mover bytes
const MOVERS: BlobTable = TableDefinition::new("movers");

/// Table for the audit log: EventId(u64) -> serialized Event bytes
const EVENTS: BlobTable = TableDefinition::new("events");

/// Table for metadata: key string -> value u64 (identifier counters)
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_NODE_ID: &str = "next_node_id";
const NEXT_EDGE_ID: &str = "next_edge_id";
const NEXT_MOVER_ID: &str = "next_mover_id";
const NEXT_EVENT_ID: &str = "next_event_id";

// =============================================================================
// TRANSACTION HELPERS
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, MeridianError> {
    postcard::to_allocvec(value).map_err(|e| MeridianError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MeridianError> {
    postcard::from_bytes(bytes).map_err(|e| MeridianError::SerializationError(e.to_string()))
}

/// Reserve the next identifier for `counter` inside a write transaction.
fn take_id(txn: &WriteTransaction, counter: &str) -> Result<u64, MeridianError> {
    let mut meta = txn.open_table(METADATA).map_err(persistence)?;
    let id = meta
        .get(counter)
        .map_err(persistence)?
        .map(|v| v.value())
        .unwrap_or(1)
        .max(1);
    meta.insert(counter, id.saturating_add(1))
        .map_err(persistence)?;
    Ok(id)
}

fn put<T: Serialize>(
    txn: &WriteTransaction,
    table: BlobTable,
    key: u64,
    value: &T,
) -> Result<(), MeridianError> {
    let bytes = encode(value)?;
    let mut table = txn.open_table(table).map_err(persistence)?;
    table.insert(key, bytes.as_slice()).map_err(persistence)?;
    Ok(())
}

fn get_in<T: DeserializeOwned>(
    txn: &WriteTransaction,
    table: BlobTable,
    key: u64,
) -> Result<Option<T>, MeridianError> {
    let table = txn.open_table(table).map_err(persistence)?;
    let guard = table.get(key).map_err(persistence)?;
    guard.map(|data| decode(data.value())).transpose()
}

fn node_exists_in(txn: &WriteTransaction, id: NodeId) -> Result<bool, MeridianError> {
    let table = txn.open_table(NODES).map_err(persistence)?;
    Ok(table.get(id.0).map_err(persistence)?.is_some())
}

fn insert_node_in(txn: &WriteTransaction, node: NewNode) -> Result<Node, MeridianError> {
    let node = Node {
        id: NodeId(take_id(txn, NEXT_NODE_ID)?),
        name: node.name,
        position: node.position,
        created_at: node.created_at,
    };
    put(txn, NODES, node.id.0, &node)?;
    Ok(node)
}

fn insert_edge_in(txn: &WriteTransaction, a: NodeId, b: NodeId) -> Result<Edge, MeridianError> {
    if a == b {
        return Err(MeridianError::Validation(format!(
            "edge endpoints must differ, got {} twice",
            a
        )));
    }
    for id in [a, b] {
        if !node_exists_in(txn, id)? {
            return Err(MeridianError::NodeNotFound(id));
        }
    }

    let (lo, hi) = Edge::endpoints(a, b);
    let existing = {
        let index = txn.open_table(EDGE_INDEX).map_err(persistence)?;
        let found = index.get((lo.0, hi.0)).map_err(persistence)?;
        found.map(|v| v.value())
    };
    if let Some(edge_id) = existing {
        if let Some(edge) = get_in::<Edge>(txn, EDGES, edge_id)? {
            return Ok(edge);
        }
    }

    let edge = Edge {
        id: EdgeId(take_id(txn, NEXT_EDGE_ID)?),
        a: lo,
        b: hi,
    };
    put(txn, EDGES, edge.id.0, &edge)?;
    let mut index = txn.open_table(EDGE_INDEX).map_err(persistence)?;
    index
        .insert((lo.0, hi.0), edge.id.0)
        .map_err(persistence)?;
    Ok(edge)
}

fn append_event_in(
    txn: &WriteTransaction,
    kind: EventKind,
    message: &str,
    at: Timestamp,
) -> Result<Event, MeridianError> {
    let event = Event {
        id: EventId(take_id(txn, NEXT_EVENT_ID)?),
        kind,
        message: message.to_string(),
        at,
    };
    put(txn, EVENTS, event.id.0, &event)?;
    Ok(event)
}

// =============================================================================
// REDB GRAPH
// =============================================================================

/// A disk-backed store using redb.
///
/// Unlike the in-memory `Graph`, every write is durable as soon as the
/// call returns, and reopening the same path restores the full state.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph").finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MeridianError> {
        let db = Database::create(path.as_ref()).map_err(persistence)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(persistence)?;
            for table in [NODES, EDGES, MOVERS, EVENTS] {
                let _ = write_txn.open_table(table).map_err(persistence)?;
            }
            let _ = write_txn.open_table(EDGE_INDEX).map_err(persistence)?;
            let _ = write_txn.open_table(METADATA).map_err(persistence)?;
            write_txn.commit().map_err(persistence)?;
        }

        Ok(Self { db })
    }

    /// Run `f` inside a write transaction and commit it.
    ///
    /// If `f` fails the transaction is dropped, which aborts it, so a failed
    /// mutation leaves no partial state behind.
    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, MeridianError>,
    ) -> Result<T, MeridianError> {
        let write_txn = self.db.begin_write().map_err(persistence)?;
        let out = f(&write_txn)?;
        write_txn.commit().map_err(persistence)?;
        Ok(out)
    }

    fn read_one<T: DeserializeOwned>(
        &self,
        table: BlobTable,
        key: u64,
    ) -> Result<Option<T>, MeridianError> {
        let read_txn = self.db.begin_read().map_err(persistence)?;
        let table = read_txn.open_table(table).map_err(persistence)?;
        let guard = table.get(key).map_err(persistence)?;
        guard.map(|data| decode(data.value())).transpose()
    }

    fn read_all<T: DeserializeOwned>(&self, table: BlobTable) -> Result<Vec<T>, MeridianError> {
        let read_txn = self.db.begin_read().map_err(persistence)?;
        let table = read_txn.open_table(table).map_err(persistence)?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(persistence)? {
            let (_, value) = entry.map_err(persistence)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn count(&self, table: BlobTable) -> Result<usize, MeridianError> {
        let read_txn = self.db.begin_read().map_err(persistence)?;
        let table = read_txn.open_table(table).map_err(persistence)?;
        let count = table.len().map_err(persistence)?;
        Ok(count as usize)
    }
}

// =============================================================================
// GRAPHSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl GraphStore for RedbGraph {
    fn insert_node(&mut self, node: NewNode) -> Result<Node, MeridianError> {
        self.write(|txn| insert_node_in(txn, node))
    }

    fn insert_edge(&mut self, a: NodeId, b: NodeId) -> Result<Edge, MeridianError> {
        self.write(|txn| insert_edge_in(txn, a, b))
    }

    fn lookup_node(&self, id: NodeId) -> Result<Option<Node>, MeridianError> {
        self.read_one(NODES, id.0)
    }

    fn nodes(&self) -> Result<Vec<Node>, MeridianError> {
        self.read_all(NODES)
    }

    fn edges(&self) -> Result<Vec<Edge>, MeridianError> {
        self.read_all(EDGES)
    }

    fn node_count(&self) -> Result<usize, MeridianError> {
        self.count(NODES)
    }

    fn edge_count(&self) -> Result<usize, MeridianError> {
        self.count(EDGES)
    }

    fn insert_mover(&mut self, mover: NewMover) -> Result<Mover, MeridianError> {
        crate::graph::validate_new_mover(&*self, &mover)?;
        self.write(|txn| {
            let mover = Mover::parked(MoverId(take_id(txn, NEXT_MOVER_ID)?), mover);
            put(txn, MOVERS, mover.id.0, &mover)?;
            Ok(mover)
        })
    }

    fn lookup_mover(&self, id: MoverId) -> Result<Option<Mover>, MeridianError> {
        self.read_one(MOVERS, id.0)
    }

    fn movers(&self) -> Result<Vec<Mover>, MeridianError> {
        self.read_all(MOVERS)
    }

    fn mover_count(&self) -> Result<usize, MeridianError> {
        self.count(MOVERS)
    }

    fn update_mover(&mut self, mover: &Mover) -> Result<(), MeridianError> {
        self.write(|txn| {
            if get_in::<Mover>(txn, MOVERS, mover.id.0)?.is_none() {
                return Err(MeridianError::MoverNotFound(mover.id));
            }
            put(txn, MOVERS, mover.id.0, mover)
        })
    }

    fn append_event(
        &mut self,
        kind: EventKind,
        message: &str,
        at: Timestamp,
    ) -> Result<Event, MeridianError> {
        self.write(|txn| append_event_in(txn, kind, message, at))
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, MeridianError> {
        let read_txn = self.db.begin_read().map_err(persistence)?;
        let table = read_txn.open_table(EVENTS).map_err(persistence)?;

        let mut events = Vec::new();
        for entry in table
            .iter()
            .map_err(persistence)?
            .rev()
            .take(limit.min(MAX_EVENT_LIMIT))
        {
            let (_, value) = entry.map_err(persistence)?;
            events.push(decode(value.value())?);
        }
        Ok(events)
    }

    fn clear(&mut self) -> Result<(), MeridianError> {
        self.write(|txn| {
            for table in [NODES, EDGES, MOVERS, EVENTS] {
                txn.delete_table(table).map_err(persistence)?;
                let _ = txn.open_table(table).map_err(persistence)?;
            }
            txn.delete_table(EDGE_INDEX).map_err(persistence)?;
            let _ = txn.open_table(EDGE_INDEX).map_err(persistence)?;
            Ok(())
        })
    }

    fn commit_expansion(
        &mut self,
        node: NewNode,
        connect_hint: Option<&str>,
    ) -> Result<Commit, MeridianError> {
        self.write(|txn| {
            let existing: Vec<NodeId> = {
                let table = txn.open_table(NODES).map_err(persistence)?;
                let mut ids = Vec::new();
                for entry in table.iter().map_err(persistence)? {
                    let (key, _) = entry.map_err(persistence)?;
                    ids.push(NodeId(key.value()));
                }
                ids
            };
            let connection = resolve_connection(connect_hint, &existing);

            let node = insert_node_in(txn, node)?;
            let edge = match connection.target {
                Some(target) => Some(insert_edge_in(txn, target, node.id)?),
                None => None,
            };
            append_event_in(
                txn,
                EventKind::Construction,
                &construction_message(&node, connection),
                node.created_at,
            )?;

            Ok(Commit {
                node,
                edge,
                connection,
            })
        })
    }
}
