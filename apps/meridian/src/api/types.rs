//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Snapshots, statuses, and cycle reports
//! are served as the core types themselves; this module holds the shapes
//! that exist only at the HTTP boundary.

use meridian_core::{
    DispatchReceipt, ErrorKind, MeridianError, MoverId, NetworkCounts, NodeId,
    primitives::{DEFAULT_EVENT_LIMIT, MAX_EVENT_LIMIT},
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body returned with any non-2xx status that has no richer shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

impl From<&MeridianError> for ErrorResponse {
    fn from(e: &MeridianError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

// =============================================================================
// STATE QUERY
// =============================================================================

/// Query string for `GET /state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateQuery {
    /// Number of recent events to include.
    pub events: Option<usize>,
}

impl StateQuery {
    /// Requested event count, defaulted and clamped.
    #[must_use]
    pub fn event_limit(&self) -> usize {
        self.events.unwrap_or(DEFAULT_EVENT_LIMIT).min(MAX_EVENT_LIMIT)
    }
}

// =============================================================================
// DISPATCH REQUEST/RESPONSE
// =============================================================================

/// Dispatch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub mover_id: u64,
    pub target_node_id: u64,
}

impl DispatchRequest {
    #[must_use]
    pub fn ids(&self) -> (MoverId, NodeId) {
        (MoverId(self.mover_id), NodeId(self.target_node_id))
    }
}

/// Dispatch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<DispatchReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResponse {
    #[must_use]
    pub fn success(receipt: DispatchReceipt) -> Self {
        Self {
            success: true,
            receipt: Some(receipt),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            receipt: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// RESET RESPONSE
// =============================================================================

/// Reset response, with the counts of the freshly seeded network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<NetworkCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResetResponse {
    #[must_use]
    pub fn success(counts: NetworkCounts) -> Self {
        Self {
            success: true,
            counts: Some(counts),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            counts: None,
            error: Some(msg.into()),
        }
    }
}
