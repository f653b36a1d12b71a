//! # API Endpoint Handlers
//!
//! Thin adapters from HTTP to core operations. Status codes follow the
//! error kind: throttled 429, consensus and oracle failures 502, validation
//! 400, not found 404, persistence 500.

use super::{
    AppState,
    types::{
        DispatchRequest, DispatchResponse, ErrorResponse, HealthResponse, ResetResponse,
        StateQuery,
    },
};
use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use meridian_core::{CycleReport, ErrorKind, MeridianError};

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Throttled => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::ConsensusFailed | ErrorKind::OracleError => StatusCode::BAD_GATEWAY,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: &MeridianError) -> Response {
    (status_for(e.kind()), Json(ErrorResponse::from(e))).into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// READ HANDLERS
// =============================================================================

/// Full snapshot: nodes, edges, movers, and recent events.
pub async fn state_handler(
    State(state): State<AppState>,
    Query(query): Query<StateQuery>,
) -> Response {
    match state.network.snapshot(query.event_limit()).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Counts, cached directive, and time until the next cycle.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    match state.orchestrator.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// EXPAND HANDLER
// =============================================================================

/// Run one expansion cycle and report its tagged outcome.
pub async fn expand_handler(State(state): State<AppState>) -> Response {
    let result = state.orchestrator.run_expansion_cycle().await;
    let report = CycleReport::from(&result);
    match result {
        Ok(_) => (StatusCode::OK, Json(report)).into_response(),
        Err(MeridianError::Throttled { retry_after_secs }) => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            Json(report),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Expansion cycle failed");
            (status_for(e.kind()), Json(report)).into_response()
        }
    }
}

// =============================================================================
// DISPATCH HANDLER
// =============================================================================

/// Send a mover towards a node.
pub async fn dispatch_handler(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> impl IntoResponse {
    let (mover, target) = request.ids();
    match state.network.dispatch(mover, target).await {
        Ok(receipt) => (StatusCode::OK, Json(DispatchResponse::success(receipt))),
        Err(e) => (
            status_for(e.kind()),
            Json(DispatchResponse::error(format!("Dispatch failed: {}", e))),
        ),
    }
}

// =============================================================================
// RESET HANDLER
// =============================================================================

/// Wipe the network and reseed it.
pub async fn reset_handler(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = match state.orchestrator.reset().await {
        Ok(()) => state.network.counts().await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(counts) => (StatusCode::OK, Json(ResetResponse::success(counts))),
        Err(e) => (
            status_for(e.kind()),
            Json(ResetResponse::error(format!("Reset failed: {}", e))),
        ),
    }
}
