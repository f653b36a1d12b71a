//! # Expansion Cycle Tests
//!
//! Drives the orchestrator against scripted oracles and a manual clock.
//!
//! ## Groups
//! - throttle: cooldown window and its timestamp rules
//! - negotiation: the bounded propose/verify loop
//! - execute: connection resolution and fleet rebalance
//! - plan: directive caching and the default directive

#![allow(clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use meridian_core::{
    Candidate, Directive, ExpansionSettings, FleetBalancer, GraphStore, ManualClock,
    MeridianError, MotionSettings, Network, Node, NodeId, OraclePhase, Oracles, Orchestrator,
    Point, ProposalOracle, StorageBackend, StrategyOracle, Timestamp, VerificationOracle, Verdict,
};
use meridian_core::{EventKind, FleetSettings};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// SCRIPTED ORACLE
// =============================================================================

#[derive(Default)]
struct Scripted {
    plan_fails: bool,
    propose_fails: bool,
    /// Proposals handed out in order; a default one once exhausted.
    proposals: Mutex<VecDeque<Candidate>>,
    /// Verdicts handed out in order; `always_valid` once exhausted.
    verdicts: Mutex<VecDeque<bool>>,
    always_valid: bool,
    plan_calls: AtomicUsize,
    propose_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    feedback_seen: Mutex<Vec<Option<String>>>,
    /// Ids of the recent nodes handed to each proposal call.
    recent_seen: Mutex<Vec<Vec<u64>>>,
    /// Ids of the node set handed to each verification call.
    nodes_seen: Mutex<Vec<Vec<u64>>>,
}

impl Scripted {
    fn accepting() -> Self {
        Self {
            always_valid: true,
            ..Self::default()
        }
    }

    fn rejecting() -> Self {
        Self::default()
    }

    fn with_proposals(self, proposals: Vec<Candidate>) -> Self {
        *self.proposals.lock().unwrap() = proposals.into();
        self
    }

    fn with_verdicts(self, verdicts: Vec<bool>) -> Self {
        *self.verdicts.lock().unwrap() = verdicts.into();
        self
    }

    fn oracle_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
            + self.propose_calls.load(Ordering::SeqCst)
            + self.verify_calls.load(Ordering::SeqCst)
    }
}

fn candidate(name: &str, x: f64, y: f64, connect_to: Option<&str>) -> Candidate {
    Candidate {
        name: name.to_string(),
        position: Point::new(x, y),
        connect_to: connect_to.map(str::to_string),
        rationale: format!("{} fills a gap", name),
    }
}

#[async_trait]
impl StrategyOracle for Scripted {
    async fn plan(&self, _node_count: usize) -> Result<Directive, MeridianError> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        if self.plan_fails {
            return Err(MeridianError::oracle(OraclePhase::Strategy, "offline"));
        }
        Ok(Directive {
            strategy: "Grow east".to_string(),
            area: "east".to_string(),
            rationale: "demand".to_string(),
        })
    }
}

#[async_trait]
impl ProposalOracle for Scripted {
    async fn propose(
        &self,
        _directive: &Directive,
        recent: &[Node],
        feedback: Option<&str>,
    ) -> Result<Candidate, MeridianError> {
        let n = self.propose_calls.fetch_add(1, Ordering::SeqCst);
        self.recent_seen
            .lock()
            .unwrap()
            .push(recent.iter().map(|node| node.id.0).collect());
        self.feedback_seen
            .lock()
            .unwrap()
            .push(feedback.map(str::to_string));
        if self.propose_fails {
            return Err(MeridianError::oracle(OraclePhase::Proposal, "timeout"));
        }
        let next = self.proposals.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| candidate(&format!("Site {}", n), 200.0 + n as f64, 10.0, None)))
    }
}

#[async_trait]
impl VerificationOracle for Scripted {
    async fn verify(&self, _candidate: &Candidate, nodes: &[Node]) -> Result<Verdict, MeridianError> {
        let n = self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.nodes_seen
            .lock()
            .unwrap()
            .push(nodes.iter().map(|node| node.id.0).collect());
        let valid = self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.always_valid);
        Ok(Verdict {
            valid,
            feedback: if valid {
                "looks good".to_string()
            } else {
                format!("rejection {}", n + 1)
            },
        })
    }
}

// =============================================================================
// HARNESS
// =============================================================================

struct Harness {
    clock: Arc<ManualClock>,
    oracle: Arc<Scripted>,
    orchestrator: Orchestrator,
}

impl Harness {
    async fn new(oracle: Scripted) -> Self {
        Self::with_backend(oracle, StorageBackend::default()).await
    }

    async fn with_backend(oracle: Scripted, backend: StorageBackend) -> Self {
        Self::build(oracle, backend, FleetSettings::default()).await
    }

    async fn with_fleet(oracle: Scripted, fleet: FleetSettings) -> Self {
        Self::build(oracle, StorageBackend::default(), fleet).await
    }

    async fn build(oracle: Scripted, backend: StorageBackend, fleet: FleetSettings) -> Self {
        let clock = Arc::new(ManualClock::starting_at(Timestamp(1_000_000)));
        let network = Arc::new(Network::new(
            backend,
            clock.clone(),
            MotionSettings::default(),
        ));
        network.seed_if_empty().await.expect("seed");

        let oracle = Arc::new(oracle);
        let orchestrator = Orchestrator::new(
            network,
            Oracles::single(oracle.clone()),
            FleetBalancer::new(fleet),
            ExpansionSettings::default(),
        );
        Self {
            clock,
            oracle,
            orchestrator,
        }
    }

    fn network(&self) -> &Network {
        self.orchestrator.network()
    }

    async fn node_count(&self) -> usize {
        self.network().read().await.node_count().expect("count")
    }

    fn wait_out_cooldown(&self) {
        self.clock.advance(Duration::from_secs(61));
    }
}

// =============================================================================
// THROTTLE
// =============================================================================

mod throttle {
    use super::*;

    #[tokio::test]
    async fn second_cycle_inside_cooldown_is_throttled_without_oracle_calls() {
        let h = Harness::new(Scripted::accepting()).await;
        h.orchestrator.run_expansion_cycle().await.expect("first cycle");
        let calls = h.oracle.oracle_calls();

        h.clock.advance(Duration::from_secs(10));
        let err = h.orchestrator.run_expansion_cycle().await.expect_err("throttled");
        assert!(matches!(
            err,
            MeridianError::Throttled {
                retry_after_secs: 50
            }
        ));
        assert_eq!(h.oracle.oracle_calls(), calls);
    }

    #[tokio::test]
    async fn cycle_allowed_after_cooldown() {
        let h = Harness::new(Scripted::accepting()).await;
        h.orchestrator.run_expansion_cycle().await.expect("first");
        h.wait_out_cooldown();
        h.orchestrator.run_expansion_cycle().await.expect("second");
        assert_eq!(h.node_count().await, 5);
    }

    #[tokio::test]
    async fn failed_cycle_still_starts_the_cooldown() {
        let h = Harness::new(Scripted::rejecting()).await;
        assert!(h.orchestrator.run_expansion_cycle().await.is_err());
        assert!(matches!(
            h.orchestrator.run_expansion_cycle().await,
            Err(MeridianError::Throttled { .. })
        ));
    }
}

// =============================================================================
// NEGOTIATION
// =============================================================================

mod negotiation {
    use super::*;

    #[tokio::test]
    async fn always_invalid_makes_exactly_three_attempts() {
        let h = Harness::new(Scripted::rejecting()).await;
        let err = h.orchestrator.run_expansion_cycle().await.expect_err("no consensus");

        assert!(matches!(err, MeridianError::Consensus { attempts: 3, .. }));
        assert_eq!(h.oracle.propose_calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.oracle.verify_calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.node_count().await, 3);

        // Only audit events were written.
        let events = h.network().snapshot(50).await.expect("snapshot").events;
        let count = |kind: EventKind| events.iter().filter(|e| e.kind == kind).count();
        assert_eq!(count(EventKind::Proposal), 3);
        assert_eq!(count(EventKind::Verification), 3);
        assert_eq!(count(EventKind::Construction), 0);
    }

    #[tokio::test]
    async fn rejection_feedback_reaches_next_proposal() {
        let h = Harness::new(Scripted::accepting().with_verdicts(vec![false, false])).await;
        let built = h.orchestrator.run_expansion_cycle().await.expect("built");

        assert_eq!(built.attempts, 3);
        let seen = h.oracle.feedback_seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                None,
                Some("rejection 1".to_string()),
                Some("rejection 2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn oracles_see_recent_window_and_full_node_set() {
        let h = Harness::new(Scripted::accepting()).await;
        for _ in 0..3 {
            h.orchestrator.run_expansion_cycle().await.expect("built");
            h.wait_out_cooldown();
        }
        assert_eq!(h.node_count().await, 6);

        h.orchestrator.run_expansion_cycle().await.expect("built");
        assert_eq!(h.node_count().await, 7);

        // Fourth cycle: the proposer sees the newest five nodes, oldest first,
        // and the verifier sees every node that existed at the time.
        let recent = h.oracle.recent_seen.lock().unwrap().clone();
        assert_eq!(recent[0], vec![1, 2, 3]);
        assert_eq!(recent[3], vec![2, 3, 4, 5, 6]);

        let nodes = h.oracle.nodes_seen.lock().unwrap().clone();
        assert_eq!(nodes[0], vec![1, 2, 3]);
        assert_eq!(nodes[3], vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn retried_proposal_sees_the_same_window() {
        let h = Harness::new(Scripted::accepting().with_verdicts(vec![false])).await;
        h.orchestrator.run_expansion_cycle().await.expect("built");

        let recent = h.oracle.recent_seen.lock().unwrap().clone();
        assert_eq!(recent, vec![vec![1, 2, 3], vec![1, 2, 3]]);
        let nodes = h.oracle.nodes_seen.lock().unwrap().clone();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|ids| ids == &vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn proposal_failure_aborts_as_oracle_error() {
        let h = Harness::new(Scripted {
            propose_fails: true,
            ..Scripted::accepting()
        })
        .await;
        let err = h.orchestrator.run_expansion_cycle().await.expect_err("oracle");
        assert!(matches!(
            err,
            MeridianError::Oracle {
                phase: OraclePhase::Proposal,
                ..
            }
        ));
        assert_eq!(h.oracle.verify_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.node_count().await, 3);
    }

    #[tokio::test]
    async fn malformed_candidate_never_reaches_the_store() {
        let h = Harness::new(
            Scripted::accepting().with_proposals(vec![candidate("Nowhere", f64::NAN, 0.0, None)]),
        )
        .await;
        let err = h.orchestrator.run_expansion_cycle().await.expect_err("oracle");
        assert!(matches!(err, MeridianError::Oracle { .. }));
        assert_eq!(h.oracle.verify_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.node_count().await, 3);
    }
}

// =============================================================================
// EXECUTE & REBALANCE
// =============================================================================

mod execute {
    use super::*;

    #[tokio::test]
    async fn non_numeric_hint_connects_to_second_most_recent_node() {
        let h = Harness::new(
            Scripted::accepting().with_proposals(vec![candidate("Harbor", 50.0, 50.0, Some("abc"))]),
        )
        .await;
        let built = h.orchestrator.run_expansion_cycle().await.expect("built");

        assert_eq!(built.node_id, NodeId(4));
        assert_eq!(built.connected_to, Some(NodeId(2)));
        assert!(built.fell_back);

        let edges = h.network().read().await.edges().expect("edges");
        assert!(edges.iter().any(|e| (e.a, e.b) == (NodeId(2), NodeId(4))));
    }

    #[tokio::test]
    async fn valid_hint_is_honoured() {
        let h = Harness::new(
            Scripted::accepting().with_proposals(vec![candidate("Harbor", 50.0, 50.0, Some("1"))]),
        )
        .await;
        let built = h.orchestrator.run_expansion_cycle().await.expect("built");
        assert_eq!(built.connected_to, Some(NodeId(1)));
        assert!(!built.fell_back);
    }

    #[tokio::test]
    async fn unknown_node_hint_falls_back() {
        let h = Harness::new(
            Scripted::accepting().with_proposals(vec![candidate("Harbor", 5.0, 5.0, Some("99"))]),
        )
        .await;
        let built = h.orchestrator.run_expansion_cycle().await.expect("built");
        assert_eq!(built.connected_to, Some(NodeId(2)));
    }

    #[tokio::test]
    async fn expansion_rebalances_fleet() {
        // Seed: 3 nodes, 1 mover. After the build 4 > 3 * 1.
        let h = Harness::new(Scripted::accepting()).await;
        let built = h.orchestrator.run_expansion_cycle().await.expect("built");

        assert!(built.spawned_mover.is_some());
        assert!(built.rebalance_error.is_none());
        assert_eq!(
            h.network().read().await.mover_count().expect("count"),
            2
        );
    }

    #[tokio::test]
    async fn failed_rebalance_is_reported_and_node_is_kept() {
        // A zero speed range makes the store refuse the new mover.
        let h = Harness::with_fleet(
            Scripted::accepting(),
            FleetSettings {
                nodes_per_mover: 3,
                min_speed_kmh: 0.0,
                max_speed_kmh: 0.0,
            },
        )
        .await;
        let built = h.orchestrator.run_expansion_cycle().await.expect("built");

        assert_eq!(built.node_id, NodeId(4));
        assert!(built.spawned_mover.is_none());
        let error = built.rebalance_error.clone().expect("rebalance error");
        assert!(error.contains("speed"));
        assert_eq!(h.node_count().await, 4);
        assert_eq!(
            h.network().read().await.mover_count().expect("count"),
            1
        );

        let result: Result<_, MeridianError> = Ok(built);
        let report = meridian_core::CycleReport::from(&result);
        assert!(matches!(
            report,
            meridian_core::CycleReport::Built {
                rebalance_error: Some(_),
                spawned_mover: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn construction_event_is_recorded() {
        let h = Harness::new(Scripted::accepting()).await;
        h.orchestrator.run_expansion_cycle().await.expect("built");
        let events = h.network().snapshot(50).await.expect("snapshot").events;
        assert!(events.iter().any(|e| e.kind == EventKind::Construction));
    }

    #[tokio::test]
    async fn persistent_cycle_survives_reopen() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("net.redb");
        {
            let backend = StorageBackend::redb(&path).expect("open");
            let h = Harness::with_backend(Scripted::accepting(), backend).await;
            h.orchestrator.run_expansion_cycle().await.expect("built");
        }
        let reopened = StorageBackend::redb(&path).expect("reopen");
        assert_eq!(reopened.node_count().expect("count"), 4);
        assert_eq!(reopened.edge_count().expect("count"), 3);
    }
}

// =============================================================================
// PLAN
// =============================================================================

mod plan {
    use super::*;

    #[tokio::test]
    async fn directive_is_cached_within_interval() {
        let h = Harness::new(Scripted::accepting()).await;
        h.orchestrator.run_expansion_cycle().await.expect("first");
        h.wait_out_cooldown();
        h.orchestrator.run_expansion_cycle().await.expect("second");
        assert_eq!(h.oracle.plan_calls.load(Ordering::SeqCst), 1);

        h.clock.advance(Duration::from_secs(2 * 60 * 60));
        h.orchestrator.run_expansion_cycle().await.expect("third");
        assert_eq!(h.oracle.plan_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn strategy_failure_uses_default_and_is_not_cached() {
        let h = Harness::new(Scripted {
            plan_fails: true,
            ..Scripted::accepting()
        })
        .await;
        h.orchestrator.run_expansion_cycle().await.expect("built anyway");
        h.wait_out_cooldown();
        h.orchestrator.run_expansion_cycle().await.expect("built again");

        assert_eq!(h.oracle.plan_calls.load(Ordering::SeqCst), 2);
        let status = h.orchestrator.status().await.expect("status");
        assert_eq!(status.directive, None);
    }

    #[tokio::test]
    async fn reset_forgets_directive_but_keeps_throttle() {
        let h = Harness::new(Scripted::accepting()).await;
        h.orchestrator.run_expansion_cycle().await.expect("built");
        assert!(h.orchestrator.status().await.expect("status").directive.is_some());

        h.orchestrator.reset().await.expect("reset");
        let status = h.orchestrator.status().await.expect("status");
        assert_eq!(status.directive, None);
        assert_eq!(status.counts.nodes, 3);
        assert_eq!(status.counts.movers, 1);
        assert!(status.next_cycle_in_secs > 0);
        assert!(matches!(
            h.orchestrator.run_expansion_cycle().await,
            Err(MeridianError::Throttled { .. })
        ));
    }
}
