//! # Dispatch
//!
//! Sends a mover towards a target node. Dispatch only changes the mover's
//! state (`Idle -> Moving`, or a retarget while already moving); the
//! Movement Engine performs the actual traversal.

use crate::graph::GraphStore;
use crate::network::Network;
use crate::{EventKind, MeridianError, MoverId, NodeId};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What a successful dispatch reports back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub mover_id: MoverId,
    pub mover_name: String,
    pub target_node_id: NodeId,
    pub target_name: String,
    /// Straight-line distance to the target in kilometres.
    pub distance_km: f64,
    /// Whole minutes to arrival at the mover's speed, rounded down.
    pub eta_minutes: u64,
}

/// Whole minutes needed to cover `distance_km` at `speed_kmh`.
#[must_use]
pub fn eta_minutes(distance_km: f64, speed_kmh: f64) -> u64 {
    if !(speed_kmh.is_finite() && speed_kmh > 0.0) {
        return 0;
    }
    (distance_km / speed_kmh * 60.0).floor().max(0.0) as u64
}

impl Network {
    /// Send `mover_id` towards `target`.
    ///
    /// Fails with [`MeridianError::Validation`] without touching the store when
    /// the mover or the target is unknown, or when the target is the node the
    /// mover is standing on.
    pub async fn dispatch(
        &self,
        mover_id: MoverId,
        target: NodeId,
    ) -> Result<DispatchReceipt, MeridianError> {
        let _guard = self.lock_mover(mover_id).await;
        let now = self.now();
        let mut store = self.write().await;

        let Some(mut mover) = store.lookup_mover(mover_id)? else {
            return Err(MeridianError::Validation(format!(
                "unknown mover {}",
                mover_id.0
            )));
        };
        let Some(node) = store.lookup_node(target)? else {
            return Err(MeridianError::Validation(format!(
                "unknown target node {}",
                target.0
            )));
        };
        if mover.current_node == Some(target) {
            return Err(MeridianError::Validation(format!(
                "{} is already at {}",
                mover.name, node.name
            )));
        }

        let distance_km = self.motion().to_km(mover.position.distance_to(node.position));
        let eta = eta_minutes(distance_km, mover.speed_kmh);

        mover.depart(target, now);
        mover.check_invariants()?;
        store.update_mover(&mover)?;
        store.append_event(
            EventKind::Dispatch,
            &format!(
                "{} dispatched to {} ({:.1} km, ETA {} min)",
                mover.name, node.name, distance_km, eta
            ),
            now,
        )?;
        info!(
            mover = mover_id.0,
            target = target.0,
            distance_km,
            eta_minutes = eta,
            "Mover dispatched"
        );

        Ok(DispatchReceipt {
            mover_id,
            mover_name: mover.name,
            target_node_id: target,
            target_name: node.name,
            distance_km,
            eta_minutes: eta,
        })
    }
}
