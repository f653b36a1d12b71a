//! # Fleet Balancer
//!
//! Keeps the node-to-mover ratio in check: whenever there are more than
//! `nodes_per_mover` nodes per mover, one new idle mover is parked at a
//! uniformly random node with a speed drawn from the configured range.
//! One call spawns at most one mover.

use crate::graph::GraphStore;
use crate::network::Network;
use crate::{EventKind, MeridianError, Mover, NewMover, Timestamp};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

const CALLSIGNS: [&str; 6] = ["Kestrel", "Heron", "Swift", "Osprey", "Falcon", "Plover"];

/// Fleet sizing rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FleetSettings {
    pub nodes_per_mover: usize,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            nodes_per_mover: 3,
            min_speed_kmh: 40.0,
            max_speed_kmh: 120.0,
        }
    }
}

/// True when `nodes` exceeds `ratio` nodes for each of the `movers`.
#[must_use]
pub fn needs_mover(nodes: usize, movers: usize, ratio: usize) -> bool {
    nodes > ratio.saturating_mul(movers)
}

/// Name for the `index`-th mover (0-based).
fn callsign(index: usize) -> String {
    format!("{}-{}", CALLSIGNS[index % CALLSIGNS.len()], index + 1)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FleetBalancer {
    settings: FleetSettings,
}

impl FleetBalancer {
    #[must_use]
    pub fn new(settings: FleetSettings) -> Self {
        Self { settings }
    }

    /// Spawn at most one mover directly against a store.
    pub fn rebalance_store<G, R>(
        &self,
        store: &mut G,
        rng: &mut R,
        now: Timestamp,
    ) -> Result<Option<Mover>, MeridianError>
    where
        G: GraphStore + ?Sized,
        R: Rng + ?Sized,
    {
        let nodes = store.nodes()?;
        let movers = store.mover_count()?;
        if !needs_mover(nodes.len(), movers, self.settings.nodes_per_mover) {
            return Ok(None);
        }
        let Some(home) = nodes.choose(rng) else {
            return Ok(None);
        };

        let (lo, hi) = (self.settings.min_speed_kmh, self.settings.max_speed_kmh);
        let speed_kmh = if hi > lo { rng.gen_range(lo..=hi) } else { lo };

        let mover = store.insert_mover(NewMover {
            name: callsign(movers),
            node: home.id,
            position: home.position,
            speed_kmh,
        })?;
        store.append_event(
            EventKind::Fleet,
            &format!(
                "{} joined the fleet at {} ({:.0} km/h)",
                mover.name, home.name, mover.speed_kmh
            ),
            now,
        )?;
        info!(
            mover = mover.id.0,
            node = home.id.0,
            speed_kmh = mover.speed_kmh,
            "Mover spawned"
        );
        Ok(Some(mover))
    }

    /// Spawn at most one mover on the shared network.
    pub async fn rebalance(&self, network: &Network) -> Result<Option<Mover>, MeridianError> {
        let now = network.now();
        let mut store = network.write().await;
        self.rebalance_store(&mut *store, &mut rand::thread_rng(), now)
    }
}
