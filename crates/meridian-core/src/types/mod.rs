//! # Core Type Definitions
//!
//! This module contains all core types for the Meridian network:
//! - Identifiers (`NodeId`, `EdgeId`, `MoverId`, `EventId`)
//! - Geometry and time (`Point`, `Timestamp`)
//! - Stored records (`Node`, `Edge`, `Mover`, `Event`)
//! - Error types (`MeridianError`, `ErrorKind`)
//!
//! ## Lifecycle
//!
//! Nodes and edges are immutable once created. Movers are the only records
//! that change after creation, and only through the transitions defined on
//! [`Mover`]. Events are append-only.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a node. Assigned monotonically by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of an undirected edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

/// Identifier of a mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MoverId(pub u64);

/// Identifier of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for MoverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mover #{}", self.0)
    }
}

// =============================================================================
// GEOMETRY & TIME
// =============================================================================

/// A planar coordinate in position units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to another point.
    #[must_use]
    pub fn distance_to(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// The point `fraction` of the way from `self` to `other`.
    ///
    /// `fraction` is clamped to `[0, 1]`, so the result always lies on the
    /// segment between the two points.
    #[must_use]
    pub fn lerp_towards(self, other: Point, fraction: f64) -> Point {
        let t = fraction.clamp(0.0, 1.0);
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Milliseconds elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub const fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// =============================================================================
// NODE & EDGE
// =============================================================================

/// A vertex of the network with a fixed planar position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub position: Point,
    pub created_at: Timestamp,
}

/// A node that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub name: String,
    pub position: Point,
    pub created_at: Timestamp,
}

impl NewNode {
    #[must_use]
    pub fn new(name: impl Into<String>, position: Point, created_at: Timestamp) -> Self {
        Self {
            name: name.into(),
            position,
            created_at,
        }
    }
}

/// An undirected connection between two distinct nodes.
///
/// Endpoints are normalized so that `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub a: NodeId,
    pub b: NodeId,
}

impl Edge {
    /// Normalize an endpoint pair so the smaller identifier comes first.
    #[must_use]
    pub fn endpoints(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        if a <= b { (a, b) } else { (b, a) }
    }
}

// =============================================================================
// MOVER
// =============================================================================

/// Mover state. `Idle -> Moving` via dispatch, `Moving -> Idle` on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoverStatus {
    Idle,
    Moving,
}

/// An entity that travels between nodes over simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub id: MoverId,
    pub name: String,
    pub position: Point,
    /// Node the mover is standing on. `None` only while in transit.
    pub current_node: Option<NodeId>,
    /// Destination. `Some` exactly when the mover is moving.
    pub target_node: Option<NodeId>,
    /// Cruise speed in km per hour.
    pub speed_kmh: f64,
    pub departed_at: Option<Timestamp>,
    pub status: MoverStatus,
}

/// A mover that has not been assigned an identifier yet. Always starts idle.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMover {
    pub name: String,
    pub node: NodeId,
    pub position: Point,
    pub speed_kmh: f64,
}

impl Mover {
    /// Build an idle mover parked at its starting node.
    #[must_use]
    pub fn parked(id: MoverId, spec: NewMover) -> Self {
        Self {
            id,
            name: spec.name,
            position: spec.position,
            current_node: Some(spec.node),
            target_node: None,
            speed_kmh: spec.speed_kmh,
            departed_at: None,
            status: MoverStatus::Idle,
        }
    }

    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.status == MoverStatus::Moving
    }

    /// Start (or redirect) a journey towards `target`.
    pub fn depart(&mut self, target: NodeId, now: Timestamp) {
        self.status = MoverStatus::Moving;
        self.target_node = Some(target);
        self.departed_at = Some(now);
    }

    /// Move along the current journey without arriving.
    pub fn advance_to(&mut self, position: Point) {
        self.position = position;
        self.current_node = None;
    }

    /// Finish the journey, snapping exactly onto the destination node.
    pub fn arrive(&mut self, node: NodeId, position: Point) {
        self.position = position;
        self.current_node = Some(node);
        self.target_node = None;
        self.status = MoverStatus::Idle;
    }

    /// Check the status invariants.
    ///
    /// - idle: current node set, no target
    /// - moving: target set and distinct from the current node
    pub fn check_invariants(&self) -> Result<(), MeridianError> {
        match self.status {
            MoverStatus::Idle => {
                if self.current_node.is_none() || self.target_node.is_some() {
                    return Err(MeridianError::Validation(format!(
                        "{} is idle but current={:?} target={:?}",
                        self.id, self.current_node, self.target_node
                    )));
                }
            }
            MoverStatus::Moving => match self.target_node {
                None => {
                    return Err(MeridianError::Validation(format!(
                        "{} is moving without a target",
                        self.id
                    )));
                }
                Some(target) if self.current_node == Some(target) => {
                    return Err(MeridianError::Validation(format!(
                        "{} is moving towards the node it stands on",
                        self.id
                    )));
                }
                Some(_) => {}
            },
        }
        if !self.position.is_finite() {
            return Err(MeridianError::Validation(format!(
                "{} has a non-finite position",
                self.id
            )));
        }
        Ok(())
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Strategy,
    Proposal,
    Verification,
    Construction,
    Fleet,
    Dispatch,
    Arrival,
    System,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Strategy => "strategy",
            EventKind::Proposal => "proposal",
            EventKind::Verification => "verification",
            EventKind::Construction => "construction",
            EventKind::Fleet => "fleet",
            EventKind::Dispatch => "dispatch",
            EventKind::Arrival => "arrival",
            EventKind::System => "system",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub message: String,
    pub at: Timestamp,
}

/// Full read view of the store, used for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub movers: Vec<Mover>,
    /// Most recent first.
    pub events: Vec<Event>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// The oracle a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OraclePhase {
    Strategy,
    Proposal,
    Verification,
}

impl fmt::Display for OraclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OraclePhase::Strategy => "strategy",
            OraclePhase::Proposal => "proposal",
            OraclePhase::Verification => "verification",
        })
    }
}

/// Errors that can occur in the Meridian system.
///
/// - No silent failures
/// - Use `Result<T, MeridianError>` for fallible operations
/// - The core never panics; all errors are recoverable by the caller
#[derive(Debug, Error)]
pub enum MeridianError {
    /// An expansion cycle was attempted inside the cooldown window.
    #[error("Expansion throttled, retry in {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    /// No proposal was accepted within the attempt cap.
    #[error("No valid candidate after {attempts} attempts: {message}")]
    Consensus { attempts: usize, message: String },

    /// An oracle call failed or returned malformed output.
    #[error("{phase} oracle failed: {message}")]
    Oracle { phase: OraclePhase, message: String },

    /// Request preconditions were violated. Nothing was mutated.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested node was not found in the store.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The requested mover was not found in the store.
    #[error("Mover not found: {0}")]
    MoverNotFound(MoverId),

    /// A store read or write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred outside the store.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Coarse classification of [`MeridianError`] for callers that need to
/// distinguish "try later" from "strategy failed" from "bad request".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Throttled,
    ConsensusFailed,
    OracleError,
    Validation,
    NotFound,
    Persistence,
}

impl MeridianError {
    /// Shorthand for an oracle failure.
    pub fn oracle(phase: OraclePhase, message: impl Into<String>) -> Self {
        Self::Oracle {
            phase,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Throttled { .. } => ErrorKind::Throttled,
            Self::Consensus { .. } => ErrorKind::ConsensusFailed,
            Self::Oracle { .. } => ErrorKind::OracleError,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NodeNotFound(_) | Self::MoverNotFound(_) => ErrorKind::NotFound,
            Self::Persistence(_) | Self::SerializationError(_) | Self::IoError(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

/// Map any store-level failure into [`MeridianError::Persistence`].
pub(crate) fn persistence<E: fmt::Display>(e: E) -> MeridianError {
    MeridianError::Persistence(e.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
