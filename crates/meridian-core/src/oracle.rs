//! # Oracles
//!
//! The three external judgments the expansion cycle depends on, and the
//! validation applied to everything they return.
//!
//! Oracle output is untrusted. A directive, candidate, or verdict only enters
//! the cycle after passing through `validated`, which trims and bounds free
//! text and rejects unusable names and coordinates. The `connect_to` hint is
//! kept as raw text and resolved later against the store.

use crate::primitives::{MAX_COORDINATE, MAX_NODE_NAME_LENGTH, MAX_ORACLE_TEXT_LENGTH};
use crate::{MeridianError, Node, OraclePhase, Point};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trim and cap free text coming from an oracle.
fn clip(text: &str) -> String {
    text.trim().chars().take(MAX_ORACLE_TEXT_LENGTH).collect()
}

// =============================================================================
// DIRECTIVE
// =============================================================================

/// Strategic guidance valid for one planning interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub strategy: String,
    pub area: String,
    pub rationale: String,
}

impl Directive {
    /// Built-in directive used when the Strategy Oracle cannot be reached.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            strategy: "Extend the network outward from its most recent hubs".to_string(),
            area: "frontier".to_string(),
            rationale: "Default directive".to_string(),
        }
    }

    pub fn validated(self) -> Result<Self, MeridianError> {
        let strategy = clip(&self.strategy);
        if strategy.is_empty() {
            return Err(MeridianError::oracle(
                OraclePhase::Strategy,
                "directive has no strategy text",
            ));
        }
        Ok(Self {
            strategy,
            area: clip(&self.area),
            rationale: clip(&self.rationale),
        })
    }
}

// =============================================================================
// CANDIDATE
// =============================================================================

/// A proposed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub position: Point,
    /// Raw, unvalidated identifier of the node to connect to.
    pub connect_to: Option<String>,
    pub rationale: String,
}

impl Candidate {
    /// Check a proposal before anything else looks at it.
    ///
    /// - name: non-empty after trimming, at most 80 characters
    /// - coordinates: finite and within `MAX_COORDINATE` of the origin on each axis
    pub fn validated(self) -> Result<Self, MeridianError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(MeridianError::oracle(
                OraclePhase::Proposal,
                "candidate name is empty",
            ));
        }
        if name.chars().count() > MAX_NODE_NAME_LENGTH {
            return Err(MeridianError::oracle(
                OraclePhase::Proposal,
                format!("candidate name exceeds {} characters", MAX_NODE_NAME_LENGTH),
            ));
        }
        let Point { x, y } = self.position;
        if !self.position.is_finite() || x.abs() > MAX_COORDINATE || y.abs() > MAX_COORDINATE {
            return Err(MeridianError::oracle(
                OraclePhase::Proposal,
                format!("candidate coordinates out of range: ({}, {})", x, y),
            ));
        }

        Ok(Self {
            name,
            position: self.position,
            connect_to: self
                .connect_to
                .map(|raw| clip(&raw))
                .filter(|raw| !raw.is_empty()),
            rationale: clip(&self.rationale),
        })
    }
}

// =============================================================================
// VERDICT
// =============================================================================

/// A verification judgment on one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub feedback: String,
}

impl Verdict {
    #[must_use]
    pub fn validated(self) -> Self {
        Self {
            valid: self.valid,
            feedback: clip(&self.feedback),
        }
    }
}

/// Result of one propose/verify round.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalOutcome {
    Accepted(Candidate),
    /// Rejected with the verifier's feedback.
    Rejected(String),
}

impl ProposalOutcome {
    #[must_use]
    pub fn judge(candidate: Candidate, verdict: Verdict) -> Self {
        if verdict.valid {
            Self::Accepted(candidate)
        } else {
            Self::Rejected(verdict.feedback)
        }
    }
}

// =============================================================================
// ORACLE TRAITS
// =============================================================================

/// Produces a directive for the next planning interval.
#[async_trait]
pub trait StrategyOracle: Send + Sync {
    async fn plan(&self, node_count: usize) -> Result<Directive, MeridianError>;
}

/// Proposes one candidate node.
///
/// `feedback` carries the verifier's reason for rejecting the previous
/// attempt in the same cycle, if any.
#[async_trait]
pub trait ProposalOracle: Send + Sync {
    async fn propose(
        &self,
        directive: &Directive,
        recent: &[Node],
        feedback: Option<&str>,
    ) -> Result<Candidate, MeridianError>;
}

/// Judges one candidate against the full node set.
#[async_trait]
pub trait VerificationOracle: Send + Sync {
    async fn verify(&self, candidate: &Candidate, nodes: &[Node]) -> Result<Verdict, MeridianError>;
}
