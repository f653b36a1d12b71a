//! Integration tests for the Meridian HTTP API.
//!
//! Uses axum-test to drive the router without binding a socket. Every server
//! is built under one mutex because the router reads its CORS and rate-limit
//! settings from environment variables.

#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use meridian::api::{
    AppState, DispatchResponse, ErrorResponse, HealthResponse, ResetResponse, create_router,
};
use meridian::config::{MeridianConfig, StorageKind};
use meridian::runtime::Runtime;
use meridian_core::{
    Candidate, CycleReport, Directive, ErrorKind, ManualClock, MeridianError, NetworkStatus, Node,
    Oracles, Point, ProposalOracle, Snapshot, StorageBackend, StrategyOracle, Timestamp,
    VerificationOracle, Verdict,
};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};

static ENV_MUTEX: Mutex<()> = Mutex::new(());

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Oracle that proposes a fixed spot east of the seed hubs.
struct FixedOracle {
    accept: bool,
}

#[async_trait]
impl StrategyOracle for FixedOracle {
    async fn plan(&self, _node_count: usize) -> Result<Directive, MeridianError> {
        Ok(Directive {
            strategy: "Grow east".to_string(),
            area: "east".to_string(),
            rationale: "test".to_string(),
        })
    }
}

#[async_trait]
impl ProposalOracle for FixedOracle {
    async fn propose(
        &self,
        _directive: &Directive,
        _recent: &[Node],
        _feedback: Option<&str>,
    ) -> Result<Candidate, MeridianError> {
        Ok(Candidate {
            name: "Harbor".to_string(),
            position: Point::new(300.0, 40.0),
            connect_to: Some("2".to_string()),
            rationale: "coastal access".to_string(),
        })
    }
}

#[async_trait]
impl VerificationOracle for FixedOracle {
    async fn verify(&self, _candidate: &Candidate, _nodes: &[Node]) -> Result<Verdict, MeridianError> {
        Ok(Verdict {
            valid: self.accept,
            feedback: if self.accept { "ok" } else { "too remote" }.to_string(),
        })
    }
}

struct Harness {
    server: TestServer,
    _guard: MutexGuard<'static, ()>,
}

fn lock_env() -> MutexGuard<'static, ()> {
    let guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: every test that touches these variables holds ENV_MUTEX.
    unsafe {
        std::env::remove_var("MERIDIAN_RATE_LIMIT");
        std::env::remove_var("MERIDIAN_CORS_ORIGINS");
    }
    guard
}

async fn build_server(accept: bool, guard: MutexGuard<'static, ()>) -> Harness {
    let config = MeridianConfig {
        storage: meridian::config::StorageConfig {
            backend: StorageKind::Memory,
            ..Default::default()
        },
        ..Default::default()
    };
    let runtime = Runtime::assemble(
        config,
        StorageBackend::default(),
        Oracles::single(Arc::new(FixedOracle { accept })),
        Arc::new(ManualClock::starting_at(Timestamp(1_000_000))),
    )
    .await
    .unwrap();
    let router = create_router(AppState::new(runtime.orchestrator));
    Harness {
        server: TestServer::new(router).unwrap(),
        _guard: guard,
    }
}

async fn test_server() -> Harness {
    build_server(true, lock_env()).await
}

// =============================================================================
// READ ENDPOINTS
// =============================================================================

#[tokio::test]
async fn health_reports_version() {
    let h = test_server().await;
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    let body: HealthResponse = response.json();
    assert_eq!(body.status, "ok");
    assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn state_returns_seeded_network() {
    let h = test_server().await;
    let response = h.server.get("/state").await;
    response.assert_status_ok();
    let snapshot: Snapshot = response.json();
    assert_eq!(snapshot.nodes.len(), 3);
    assert_eq!(snapshot.edges.len(), 2);
    assert_eq!(snapshot.movers.len(), 1);
    assert!(!snapshot.events.is_empty());
}

#[tokio::test]
async fn state_honours_event_limit() {
    let h = test_server().await;
    let snapshot: Snapshot = h.server.get("/state").add_query_param("events", 0).await.json();
    assert!(snapshot.events.is_empty());
    assert_eq!(snapshot.nodes.len(), 3);
}

#[tokio::test]
async fn status_reports_counts_and_readiness() {
    let h = test_server().await;
    let response = h.server.get("/status").await;
    response.assert_status_ok();
    let status: NetworkStatus = response.json();
    assert_eq!(status.counts.nodes, 3);
    assert_eq!(status.counts.movers, 1);
    assert_eq!(status.counts.moving, 0);
    assert!(!status.persistent);
    assert_eq!(status.next_cycle_in_secs, 0);
    assert!(status.directive.is_none());
}

// =============================================================================
// EXPAND
// =============================================================================

#[tokio::test]
async fn expand_builds_then_throttles() {
    let h = test_server().await;

    let response = h.server.post("/expand").await;
    response.assert_status_ok();
    let report: CycleReport = response.json();
    assert!(matches!(
        report,
        CycleReport::Built {
            node_id: 4,
            connected_to: Some(2),
            fell_back: false,
            attempts: 1,
            ..
        }
    ));

    let response = h.server.post("/expand").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header("retry-after"), "60");
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["status"], "throttled");
    assert_eq!(body["retry_after_secs"], 60);

    let status: NetworkStatus = h.server.get("/status").await.json();
    assert_eq!(status.counts.nodes, 4);
    assert!(status.directive.is_some());
}

#[tokio::test]
async fn expand_without_consensus_is_bad_gateway() {
    let h = build_server(false, lock_env()).await;
    let response = h.server.post("/expand").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["status"], "consensus_failed");

    let status: NetworkStatus = h.server.get("/status").await.json();
    assert_eq!(status.counts.nodes, 3);
}

// =============================================================================
// DISPATCH
// =============================================================================

#[tokio::test]
async fn dispatch_returns_receipt() {
    let h = test_server().await;
    let response = h
        .server
        .post("/dispatch")
        .json(&json!({ "mover_id": 1, "target_node_id": 2 }))
        .await;
    response.assert_status_ok();
    let body: DispatchResponse = response.json();
    assert!(body.success);
    let receipt = body.receipt.unwrap();
    assert_eq!(receipt.target_name, "Eastgate");
    // (0,0) -> (120,40) is about 126.5 km; 80 km/h gives 94 minutes.
    assert_eq!(receipt.eta_minutes, 94);

    let status: NetworkStatus = h.server.get("/status").await.json();
    assert_eq!(status.counts.moving, 1);
}

#[tokio::test]
async fn dispatch_rejects_bad_requests() {
    let h = test_server().await;

    for body in [
        json!({ "mover_id": 99, "target_node_id": 2 }),
        json!({ "mover_id": 1, "target_node_id": 99 }),
        json!({ "mover_id": 1, "target_node_id": 1 }),
    ] {
        let response = h.server.post("/dispatch").json(&body).await;
        response.assert_status_bad_request();
        let parsed: DispatchResponse = response.json();
        assert!(!parsed.success);
        assert!(parsed.error.is_some());
    }

    let status: NetworkStatus = h.server.get("/status").await.json();
    assert_eq!(status.counts.moving, 0);
}

#[tokio::test]
async fn dispatch_with_malformed_body_is_rejected() {
    let h = test_server().await;
    let response = h
        .server
        .post("/dispatch")
        .json(&json!({ "mover_id": "one" }))
        .await;
    assert!(response.status_code().is_client_error());
}

// =============================================================================
// RESET
// =============================================================================

#[tokio::test]
async fn reset_restores_starter_network() {
    let h = test_server().await;
    h.server.post("/expand").await.assert_status_ok();

    let response = h.server.post("/reset").await;
    response.assert_status_ok();
    let body: ResetResponse = response.json();
    assert!(body.success);
    let counts = body.counts.unwrap();
    assert_eq!((counts.nodes, counts.edges, counts.movers), (3, 2, 1));

    // The throttle survives a reset.
    h.server
        .post("/expand")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let guard = lock_env();
    // SAFETY: ENV_MUTEX is held.
    unsafe { std::env::set_var("MERIDIAN_RATE_LIMIT", "1") };
    let h = build_server(true, guard).await;

    h.server.get("/health").await.assert_status_ok();
    h.server
        .get("/health")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    // SAFETY: ENV_MUTEX is held.
    unsafe { std::env::remove_var("MERIDIAN_RATE_LIMIT") };
}

#[test]
fn error_response_shape() {
    let body = ErrorResponse::from(&MeridianError::MoverNotFound(meridian_core::MoverId(7)));
    assert_eq!(body.kind, ErrorKind::NotFound);
    assert!(body.error.contains("7"));
}
