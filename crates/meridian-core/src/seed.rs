//! # Seeding
//!
//! The starter network: three hubs joined in a path, and one idle mover
//! parked at the first hub.

use crate::graph::GraphStore;
use crate::network::Network;
use crate::{EventKind, MeridianError, NewMover, NewNode, Point, Timestamp};
use tracing::info;

const STARTER_HUBS: [(&str, f64, f64); 3] = [
    ("Meridian Central", 0.0, 0.0),
    ("Eastgate", 120.0, 40.0),
    ("Northfield", 60.0, 150.0),
];

const STARTER_MOVER: &str = "Kestrel-1";
const STARTER_SPEED_KMH: f64 = 80.0;

/// Seed `store` if it holds no nodes. Returns whether anything was written.
pub fn seed_if_empty<G: GraphStore + ?Sized>(
    store: &mut G,
    now: Timestamp,
) -> Result<bool, MeridianError> {
    if store.node_count()? > 0 {
        return Ok(false);
    }

    let mut hubs = Vec::with_capacity(STARTER_HUBS.len());
    for (name, x, y) in STARTER_HUBS {
        hubs.push(store.insert_node(NewNode::new(name, Point::new(x, y), now))?);
    }
    for pair in hubs.windows(2) {
        store.insert_edge(pair[0].id, pair[1].id)?;
    }

    let home = &hubs[0];
    store.insert_mover(NewMover {
        name: STARTER_MOVER.to_string(),
        node: home.id,
        position: home.position,
        speed_kmh: STARTER_SPEED_KMH,
    })?;
    store.append_event(
        EventKind::System,
        &format!(
            "Network seeded with {} hubs and {} at {}",
            hubs.len(),
            STARTER_MOVER,
            home.name
        ),
        now,
    )?;
    Ok(true)
}

impl Network {
    /// Seed the shared store if it is empty.
    pub async fn seed_if_empty(&self) -> Result<bool, MeridianError> {
        let now = self.now();
        let seeded = seed_if_empty(&mut *self.write().await, now)?;
        if seeded {
            info!("Seeded starter network");
        }
        Ok(seeded)
    }

    /// Clear every record and reseed.
    pub async fn reset(&self) -> Result<(), MeridianError> {
        let now = self.now();
        {
            let mut store = self.write().await;
            store.clear()?;
            seed_if_empty(&mut *store, now)?;
        }
        self.forget_mover_locks();
        info!("Network reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::MoverStatus;

    #[test]
    fn seeds_connected_path_and_one_mover() {
        let mut graph = Graph::new();
        assert!(seed_if_empty(&mut graph, Timestamp(5)).expect("seed"));

        assert_eq!(graph.node_count().expect("count"), 3);
        assert_eq!(graph.edge_count().expect("count"), 2);
        let movers = graph.movers().expect("movers");
        assert_eq!(movers.len(), 1);
        assert_eq!(movers[0].status, MoverStatus::Idle);
        assert!(movers[0].check_invariants().is_ok());
        assert_eq!(
            graph.recent_events(1).expect("events")[0].kind,
            EventKind::System
        );
    }

    #[test]
    fn seeding_is_idempotent() {
        let mut graph = Graph::new();
        seed_if_empty(&mut graph, Timestamp(0)).expect("seed");
        assert!(!seed_if_empty(&mut graph, Timestamp(1)).expect("seed"));
        assert_eq!(graph.node_count().expect("count"), 3);
        assert_eq!(graph.mover_count().expect("count"), 1);
    }
}
