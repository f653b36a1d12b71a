//! # Fixed Primitives
//!
//! Hardcoded constants for the Meridian core.
//!
//! Values a deployment may want to tune live in the settings structs
//! (`ExpansionSettings`, `MotionSettings`, `FleetSettings`); the values here
//! are part of the protocol and do not change at runtime.

/// Maximum number of propose/verify rounds in one expansion cycle.
pub const MAX_PROPOSAL_ATTEMPTS: usize = 3;

/// Seconds in one hour, for converting km/h speeds into per-tick distances.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

// =============================================================================
// ORACLE OUTPUT LIMITS
// =============================================================================

/// Maximum length of a proposed node name, in characters.
pub const MAX_NODE_NAME_LENGTH: usize = 80;

/// Oracle free text (rationale, feedback, strategy) is truncated to this many characters.
pub const MAX_ORACLE_TEXT_LENGTH: usize = 2000;

/// Proposed coordinates outside `[-MAX_COORDINATE, MAX_COORDINATE]` are rejected.
pub const MAX_COORDINATE: f64 = 1_000_000.0;

// =============================================================================
// READ LIMITS
// =============================================================================

/// Number of events returned by a snapshot when the caller does not ask.
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Upper bound on events returned by a single read.
pub const MAX_EVENT_LIMIT: usize = 500;
