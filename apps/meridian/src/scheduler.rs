//! # Movement Scheduler
//!
//! Background task that calls [`MovementEngine::tick`] at a fixed period.
//! Late ticks are skipped rather than bunched up, and the task exits when
//! the shutdown channel flips to `true` or its sender is dropped.

use meridian_core::MovementEngine;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Spawn the tick loop.
pub fn spawn_movement(
    engine: MovementEngine,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = period.as_millis() as u64, "Movement scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = engine.tick().await {
                        warn!(error = %e, "Movement tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Movement scheduler stopped");
    })
}
