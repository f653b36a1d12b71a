//! # End-to-End Journey
//!
//! Dispatch a mover across a 150 km link and tick it home.

#![allow(clippy::unwrap_used, clippy::panic)]

use meridian_core::{
    GraphStore, ManualClock, MeridianError, MotionSettings, MoverStatus, MovementEngine, NewMover,
    NewNode, Network, NodeId, Point, StorageBackend, Timestamp,
};
use std::sync::Arc;

async fn corridor(motion: MotionSettings) -> (Arc<Network>, meridian_core::MoverId) {
    let network = Arc::new(Network::new(
        StorageBackend::default(),
        Arc::new(ManualClock::starting_at(Timestamp(0))),
        motion,
    ));
    let mover = {
        let mut store = network.write().await;
        let a = store
            .insert_node(NewNode::new("Alder", Point::new(0.0, 0.0), Timestamp(0)))
            .expect("node");
        let b = store
            .insert_node(NewNode::new("Birch", Point::new(150.0, 0.0), Timestamp(0)))
            .expect("node");
        store.insert_edge(a.id, b.id).expect("edge");
        store
            .insert_mover(NewMover {
                name: "Osprey-1".to_string(),
                node: a.id,
                position: a.position,
                speed_kmh: 80.0,
            })
            .expect("mover")
            .id
    };
    (network, mover)
}

#[tokio::test]
async fn dispatch_reports_distance_and_eta() {
    let (network, mover) = corridor(MotionSettings::default()).await;
    let receipt = network.dispatch(mover, NodeId(2)).await.expect("dispatch");

    assert!((receipt.distance_km - 150.0).abs() < 1e-9);
    assert_eq!(receipt.eta_minutes, 112);
}

#[tokio::test]
async fn mover_ticks_to_arrival_without_overshoot() {
    let (network, mover) = corridor(MotionSettings::default()).await;
    network.dispatch(mover, NodeId(2)).await.expect("dispatch");
    let engine = MovementEngine::new(Arc::clone(&network));

    // 80 km/h over 3 simulated seconds per tick: 150 km takes 2250 ticks.
    let mut last_x = 0.0;
    let mut ticks = 0;
    loop {
        let report = engine.tick().await.expect("tick");
        ticks += 1;
        let m = network.read().await.lookup_mover(mover).expect("lookup").expect("mover");
        assert!(m.position.x >= last_x);
        assert!(m.position.x <= 150.0);
        last_x = m.position.x;
        if report.arrived == 1 {
            assert_eq!(m.status, MoverStatus::Idle);
            assert_eq!(m.position, Point::new(150.0, 0.0));
            assert_eq!(m.current_node, Some(NodeId(2)));
            break;
        }
        assert!(ticks < 2_300, "mover never arrived");
    }
    assert!((2_249..=2_251).contains(&ticks));
}

#[tokio::test]
async fn arrived_mover_cannot_be_sent_to_the_node_it_is_on() {
    let (network, mover) = corridor(MotionSettings {
        time_acceleration: 1_000_000.0,
        ..MotionSettings::default()
    })
    .await;
    network.dispatch(mover, NodeId(2)).await.expect("dispatch");
    MovementEngine::new(Arc::clone(&network))
        .tick()
        .await
        .expect("tick");

    assert!(matches!(
        network.dispatch(mover, NodeId(2)).await,
        Err(MeridianError::Validation(_))
    ));
    // Going back is fine.
    network.dispatch(mover, NodeId(1)).await.expect("return trip");
}
