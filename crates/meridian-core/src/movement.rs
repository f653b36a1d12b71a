//! # Movement Engine
//!
//! Fixed-step simulation of movers travelling towards their targets.
//!
//! Each tick converts the tick period, scaled by the time acceleration, into
//! simulated seconds, and from there into a travel distance in position units
//! for every moving mover. A mover whose remaining distance fits inside one
//! step snaps exactly onto its target and becomes idle; everyone else moves
//! along the straight line by exactly one step and never overshoots.

use crate::graph::GraphStore;
use crate::network::Network;
use crate::primitives::SECONDS_PER_HOUR;
use crate::{EventKind, MeridianError, MoverId, NodeId, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// =============================================================================
// MOTION SETTINGS
// =============================================================================

/// Conversion between wall-clock ticks, simulated time, and distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    /// Wall-clock period between ticks.
    pub tick: Duration,
    /// Simulated seconds per wall-clock second.
    pub time_acceleration: f64,
    /// Real-world kilometres per position unit.
    pub distance_scale_km: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            time_acceleration: 60.0,
            distance_scale_km: 1.0,
        }
    }
}

impl MotionSettings {
    /// Simulated seconds covered by one tick.
    #[must_use]
    pub fn simulated_secs_per_tick(&self) -> f64 {
        self.tick.as_secs_f64() * self.time_acceleration
    }

    /// Distance in position units a mover at `speed_kmh` covers in one tick.
    #[must_use]
    pub fn step_distance(&self, speed_kmh: f64) -> f64 {
        let km = speed_kmh * self.simulated_secs_per_tick() / SECONDS_PER_HOUR;
        (km / self.distance_scale_km).max(0.0)
    }

    /// Convert a distance in position units into kilometres.
    #[must_use]
    pub fn to_km(&self, units: f64) -> f64 {
        units * self.distance_scale_km
    }
}

// =============================================================================
// STEP
// =============================================================================

/// Outcome of moving one step towards a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Still travelling; the new position.
    Advanced(Point),
    /// Reached the target; the position is exactly the target's.
    Arrived(Point),
}

/// Move from `from` towards `to` by at most `step` units.
#[must_use]
pub fn advance(from: Point, to: Point, step: f64) -> Step {
    let remaining = from.distance_to(to);
    if remaining <= step {
        Step::Arrived(to)
    } else {
        Step::Advanced(from.lerp_towards(to, step / remaining))
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Per-tick counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub advanced: usize,
    pub arrived: usize,
    /// Movers left alone because a dispatch or an earlier tick held their lock.
    pub skipped: usize,
    /// Movers whose update failed; the rest of the tick carried on.
    pub failed: usize,
}

enum Progress {
    Advanced,
    Arrived { name: String, node: NodeId },
}

/// Drives every moving mover forward by one fixed step.
#[derive(Debug, Clone)]
pub struct MovementEngine {
    network: Arc<Network>,
}

impl MovementEngine {
    #[must_use]
    pub fn new(network: Arc<Network>) -> Self {
        Self { network }
    }

    /// Run one tick over all moving movers.
    ///
    /// Only the initial listing can fail the whole tick. Failures while
    /// updating a single mover are logged and counted.
    pub async fn tick(&self) -> Result<TickReport, MeridianError> {
        let moving: Vec<MoverId> = {
            let store = self.network.read().await;
            store
                .movers()?
                .into_iter()
                .filter(|m| m.is_moving() && m.target_node.is_some())
                .map(|m| m.id)
                .collect()
        };

        let mut report = TickReport::default();
        for id in moving {
            let Some(_guard) = self.network.try_lock_mover(id) else {
                report.skipped += 1;
                continue;
            };
            match self.step_mover(id).await {
                Ok(Some(Progress::Advanced)) => report.advanced += 1,
                Ok(Some(Progress::Arrived { name, node })) => {
                    info!(mover = id.0, node = node.0, "{} arrived at {}", name, node);
                    report.arrived += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(mover = id.0, error = %e, "Mover update failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            advanced = report.advanced,
            arrived = report.arrived,
            skipped = report.skipped,
            failed = report.failed,
            "tick"
        );
        Ok(report)
    }

    /// Read, advance, and persist one mover. The caller holds its lock.
    async fn step_mover(&self, id: MoverId) -> Result<Option<Progress>, MeridianError> {
        let now = self.network.now();
        let mut store = self.network.write().await;

        // Re-read under the lock: a reset or an arrival may have happened
        // since the listing.
        let Some(mut mover) = store.lookup_mover(id)? else {
            return Ok(None);
        };
        let Some(target_id) = mover.target_node.filter(|_| mover.is_moving()) else {
            return Ok(None);
        };
        let target = store
            .lookup_node(target_id)?
            .ok_or(MeridianError::NodeNotFound(target_id))?;

        let step = self.network.motion().step_distance(mover.speed_kmh);
        match advance(mover.position, target.position, step) {
            Step::Arrived(position) => {
                mover.arrive(target.id, position);
                store.update_mover(&mover)?;
                store.append_event(
                    EventKind::Arrival,
                    &format!("{} arrived at {} {}", mover.name, target.name, target.id),
                    now,
                )?;
                Ok(Some(Progress::Arrived {
                    name: mover.name,
                    node: target.id,
                }))
            }
            Step::Advanced(position) => {
                mover.advance_to(position);
                store.update_mover(&mover)?;
                Ok(Some(Progress::Advanced))
            }
        }
    }
}
