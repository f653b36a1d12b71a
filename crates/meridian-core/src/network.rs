//! # Network
//!
//! The shared handle every core operation runs against: the store behind an
//! async read/write lock, one mutation lock per mover, the clock, and the
//! motion settings used to convert position units into kilometres.
//!
//! ## Lock ordering
//!
//! A mover lock is always taken before the store lock, and neither is ever
//! held across an oracle call.

use crate::clock::Clock;
use crate::graph::GraphStore;
use crate::movement::MotionSettings;
use crate::storage::StorageBackend;
use crate::{Event, EventKind, MeridianError, MoverId, Snapshot, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

// =============================================================================
// MOVER LOCKS
// =============================================================================

/// Guard proving exclusive access to one mover's read-modify-persist cycle.
pub type MoverGuard = OwnedMutexGuard<()>;

/// Lazily created per-mover mutation locks.
#[derive(Debug, Default)]
struct MoverLocks {
    slots: Mutex<BTreeMap<MoverId, Arc<AsyncMutex<()>>>>,
}

impl MoverLocks {
    fn slot(&self, id: MoverId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(id).or_default())
    }

    async fn acquire(&self, id: MoverId) -> MoverGuard {
        self.slot(id).lock_owned().await
    }

    fn try_acquire(&self, id: MoverId) -> Option<MoverGuard> {
        self.slot(id).try_lock_owned().ok()
    }

    fn clear(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

// =============================================================================
// NETWORK
// =============================================================================

/// Record counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkCounts {
    pub nodes: usize,
    pub edges: usize,
    pub movers: usize,
    pub moving: usize,
}

/// Shared state for the orchestrator, the movement engine, and dispatch.
pub struct Network {
    store: RwLock<StorageBackend>,
    locks: MoverLocks,
    clock: Arc<dyn Clock>,
    motion: MotionSettings,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("motion", &self.motion)
            .finish_non_exhaustive()
    }
}

impl Network {
    #[must_use]
    pub fn new(backend: StorageBackend, clock: Arc<dyn Clock>, motion: MotionSettings) -> Self {
        Self {
            store: RwLock::new(backend),
            locks: MoverLocks::default(),
            clock,
            motion,
        }
    }

    /// Current wall-clock time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    #[must_use]
    pub fn motion(&self) -> &MotionSettings {
        &self.motion
    }

    /// Shared read access to the store.
    pub async fn read(&self) -> RwLockReadGuard<'_, StorageBackend> {
        self.store.read().await
    }

    /// Exclusive write access to the store.
    pub async fn write(&self) -> RwLockWriteGuard<'_, StorageBackend> {
        self.store.write().await
    }

    /// Wait for exclusive access to a mover.
    pub async fn lock_mover(&self, id: MoverId) -> MoverGuard {
        self.locks.acquire(id).await
    }

    /// Take exclusive access to a mover if nobody else holds it.
    #[must_use]
    pub fn try_lock_mover(&self, id: MoverId) -> Option<MoverGuard> {
        self.locks.try_acquire(id)
    }

    pub(crate) fn forget_mover_locks(&self) {
        self.locks.clear();
    }

    /// Append an audit event stamped with the current time.
    pub async fn record(&self, kind: EventKind, message: &str) -> Result<Event, MeridianError> {
        let now = self.now();
        self.write().await.append_event(kind, message, now)
    }

    /// Full current state with up to `event_limit` recent events.
    pub async fn snapshot(&self, event_limit: usize) -> Result<Snapshot, MeridianError> {
        self.read().await.snapshot(event_limit)
    }

    pub async fn counts(&self) -> Result<NetworkCounts, MeridianError> {
        let store = self.read().await;
        let movers = store.movers()?;
        Ok(NetworkCounts {
            nodes: store.node_count()?,
            edges: store.edge_count()?,
            moving: movers.iter().filter(|m| m.is_moving()).count(),
            movers: movers.len(),
        })
    }

    pub async fn is_persistent(&self) -> bool {
        self.read().await.is_persistent()
    }
}
