//! # meridian-core
//!
//! The network engine for Meridian - THE LOGIC.
//!
//! This crate owns a self-growing graph of nodes and edges, the movers that
//! travel it, and the append-only audit log that records both.
//!
//! ## Subsystems
//!
//! - `expansion`: the oracle-driven cycle that plans, proposes, verifies, and
//!   commits new nodes, then rebalances the fleet
//! - `movement`: the fixed-step engine that moves movers towards their targets
//!   and detects arrivals
//! - `dispatch`: the `Idle -> Moving` transition, with distance and ETA
//! - `graph` / `storage`: the `GraphStore` contract with in-memory and redb
//!   backends
//!
//! ## Architectural Constraints
//!
//! - Every store mutation is committed before the call returns
//! - Oracle output is untrusted and validated before it reaches the store
//! - No store lock is held across an oracle await point
//! - A mover lock is always taken before the store lock

// =============================================================================
// MODULES
// =============================================================================

pub mod clock;
pub mod dispatch;
pub mod expansion;
pub mod fleet;
pub mod graph;
pub mod movement;
pub mod network;
pub mod oracle;
pub mod primitives;
pub mod seed;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Edge, EdgeId, ErrorKind, Event, EventId, EventKind, MeridianError, Mover, MoverId,
    MoverStatus, NewMover, NewNode, Node, NodeId, OraclePhase, Point, Snapshot, Timestamp,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use graph::{Commit, Connection, Graph, GraphStore, fallback_connection, resolve_connection};
pub use storage::{RedbGraph, StorageBackend};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{DispatchReceipt, eta_minutes};
pub use expansion::{
    CycleReport, Expansion, ExpansionContext, ExpansionSettings, NetworkStatus, Oracles,
    Orchestrator,
};
pub use fleet::{FleetBalancer, FleetSettings, needs_mover};
pub use movement::{MotionSettings, MovementEngine, Step, TickReport, advance};
pub use network::{MoverGuard, Network, NetworkCounts};
pub use oracle::{
    Candidate, Directive, ProposalOracle, ProposalOutcome, StrategyOracle, VerificationOracle,
    Verdict,
};
pub use seed::seed_if_empty;
