//! # Expansion Orchestrator
//!
//! Grows the network one node per cycle:
//!
//! 1. **Throttle**: refuse to start inside the cooldown window.
//! 2. **Plan**: reuse the cached directive, or ask the Strategy Oracle. A
//!    failed plan falls back to [`Directive::fallback`] and never aborts.
//! 3. **Propose/Verify**: at most [`MAX_PROPOSAL_ATTEMPTS`] rounds, each
//!    feeding the previous rejection back to the proposer.
//! 4. **Execute**: commit the accepted candidate and its edge atomically.
//! 5. **Rebalance**: give the Fleet Balancer a chance to spawn a mover.
//!
//! Phases run strictly in order. No store lock is held while an oracle call
//! is in flight; each store access takes and releases the lock on its own.

use crate::fleet::FleetBalancer;
use crate::graph::GraphStore;
use crate::network::{Network, NetworkCounts};
use crate::oracle::{
    Candidate, Directive, ProposalOracle, ProposalOutcome, StrategyOracle, VerificationOracle,
};
use crate::primitives::MAX_PROPOSAL_ATTEMPTS;
use crate::{ErrorKind, EventKind, MeridianError, MoverId, NewNode, NodeId, Point, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

// =============================================================================
// SETTINGS & CONTEXT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionSettings {
    /// Minimum time between two cycle invocations.
    pub cooldown: Duration,
    /// How long a directive from the Strategy Oracle stays valid.
    pub planning_interval: Duration,
    /// Number of recent nodes shown to the Proposal Oracle.
    pub recent_node_window: usize,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            planning_interval: Duration::from_secs(2 * 60 * 60),
            recent_node_window: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedDirective {
    directive: Directive,
    planned_at: Timestamp,
}

/// Process-lifetime state of the orchestrator.
///
/// Both fields sit behind short-lived std mutexes that are never held across
/// an await point.
#[derive(Debug, Default)]
pub struct ExpansionContext {
    last_attempt: Mutex<Option<Timestamp>>,
    directive: Mutex<Option<CachedDirective>>,
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

impl ExpansionContext {
    /// Claim the right to run a cycle at `now`.
    ///
    /// On success the throttle timestamp moves to `now`. A throttled call
    /// leaves it untouched.
    fn try_begin(&self, now: Timestamp, cooldown: Duration) -> Result<(), MeridianError> {
        let mut last = self.last_attempt.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(retry_after_secs) = remaining_secs(*last, now, cooldown) {
            return Err(MeridianError::Throttled { retry_after_secs });
        }
        *last = Some(now);
        Ok(())
    }

    /// Whole seconds until the next cycle may start, `0` if it may start now.
    pub fn retry_after(&self, now: Timestamp, cooldown: Duration) -> u64 {
        let last = self.last_attempt.lock().unwrap_or_else(|e| e.into_inner());
        remaining_secs(*last, now, cooldown).unwrap_or(0)
    }

    fn cached_directive(&self, now: Timestamp, interval: Duration) -> Option<Directive> {
        let cached = self.directive.lock().unwrap_or_else(|e| e.into_inner());
        cached
            .as_ref()
            .filter(|c| now.millis_since(c.planned_at) < millis(interval))
            .map(|c| c.directive.clone())
    }

    fn remember(&self, directive: Directive, now: Timestamp) {
        *self.directive.lock().unwrap_or_else(|e| e.into_inner()) = Some(CachedDirective {
            directive,
            planned_at: now,
        });
    }

    fn forget_directive(&self) {
        *self.directive.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// The cached directive regardless of age.
    pub fn current_directive(&self) -> Option<Directive> {
        self.directive
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|c| c.directive.clone())
    }
}

fn remaining_secs(last: Option<Timestamp>, now: Timestamp, cooldown: Duration) -> Option<u64> {
    let elapsed = now.millis_since(last?);
    let cooldown = millis(cooldown);
    (elapsed < cooldown).then(|| (cooldown - elapsed).div_ceil(1000))
}

// =============================================================================
// RESULTS
// =============================================================================

/// A committed expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expansion {
    pub node_id: NodeId,
    pub name: String,
    pub position: Point,
    pub connected_to: Option<NodeId>,
    /// The proposer's connection hint was unusable and the fallback applied.
    pub fell_back: bool,
    pub rationale: String,
    /// Propose/verify rounds used, 1-based.
    pub attempts: usize,
    pub spawned_mover: Option<MoverId>,
    /// The node was committed but the fleet could not be rebalanced.
    pub rebalance_error: Option<String>,
}

/// Serializable, discriminated outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleReport {
    Built {
        node_id: u64,
        name: String,
        x: f64,
        y: f64,
        connected_to: Option<u64>,
        fell_back: bool,
        rationale: String,
        attempts: usize,
        spawned_mover: Option<u64>,
        rebalance_error: Option<String>,
    },
    Throttled {
        message: String,
        retry_after_secs: u64,
    },
    ConsensusFailed {
        message: String,
    },
    OracleError {
        message: String,
    },
    PersistenceError {
        message: String,
    },
}

impl From<&Result<Expansion, MeridianError>> for CycleReport {
    fn from(result: &Result<Expansion, MeridianError>) -> Self {
        match result {
            Ok(e) => Self::Built {
                node_id: e.node_id.0,
                name: e.name.clone(),
                x: e.position.x,
                y: e.position.y,
                connected_to: e.connected_to.map(|id| id.0),
                fell_back: e.fell_back,
                rationale: e.rationale.clone(),
                attempts: e.attempts,
                spawned_mover: e.spawned_mover.map(|id| id.0),
                rebalance_error: e.rebalance_error.clone(),
            },
            Err(err) => {
                let message = err.to_string();
                match (err, err.kind()) {
                    (MeridianError::Throttled { retry_after_secs }, _) => Self::Throttled {
                        message,
                        retry_after_secs: *retry_after_secs,
                    },
                    (_, ErrorKind::ConsensusFailed) => Self::ConsensusFailed { message },
                    (_, ErrorKind::OracleError) => Self::OracleError { message },
                    _ => Self::PersistenceError { message },
                }
            }
        }
    }
}

/// Point-in-time overview of the network and the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    #[serde(flatten)]
    pub counts: NetworkCounts,
    pub persistent: bool,
    pub directive: Option<Directive>,
    /// Seconds until the next cycle is allowed, `0` if it may start now.
    pub next_cycle_in_secs: u64,
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// The three oracles a cycle consults.
#[derive(Clone)]
pub struct Oracles {
    pub strategy: Arc<dyn StrategyOracle>,
    pub proposal: Arc<dyn ProposalOracle>,
    pub verification: Arc<dyn VerificationOracle>,
}

impl Oracles {
    /// Use one value for all three roles.
    pub fn single<O>(oracle: Arc<O>) -> Self
    where
        O: StrategyOracle + ProposalOracle + VerificationOracle + 'static,
    {
        Self {
            strategy: oracle.clone(),
            proposal: oracle.clone(),
            verification: oracle,
        }
    }
}

pub struct Orchestrator {
    network: Arc<Network>,
    oracles: Oracles,
    fleet: FleetBalancer,
    settings: ExpansionSettings,
    context: ExpansionContext,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("fleet", &self.fleet)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        network: Arc<Network>,
        oracles: Oracles,
        fleet: FleetBalancer,
        settings: ExpansionSettings,
    ) -> Self {
        Self {
            network,
            oracles,
            fleet,
            settings,
            context: ExpansionContext::default(),
        }
    }

    #[must_use]
    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// Run one full cycle.
    pub async fn run_expansion_cycle(&self) -> Result<Expansion, MeridianError> {
        let started = self.network.now();
        self.context.try_begin(started, self.settings.cooldown)?;

        let directive = self.plan(started).await?;
        let (candidate, attempts) = self.negotiate(&directive).await?;

        let commit = {
            let node = NewNode::new(candidate.name.clone(), candidate.position, self.network.now());
            let mut store = self.network.write().await;
            store.commit_expansion(node, candidate.connect_to.as_deref())?
        };
        info!(
            node = commit.node.id.0,
            connected_to = ?commit.connection.target.map(|id| id.0),
            fell_back = commit.connection.fell_back,
            attempts,
            "Built {}",
            commit.node.name
        );

        let (spawned_mover, rebalance_error) = match self.fleet.rebalance(&self.network).await {
            Ok(mover) => (mover.map(|m| m.id), None),
            Err(e) => {
                warn!(error = %e, node = commit.node.id.0, "Fleet rebalance failed after expansion");
                (None, Some(e.to_string()))
            }
        };

        Ok(Expansion {
            node_id: commit.node.id,
            name: commit.node.name,
            position: commit.node.position,
            connected_to: commit.connection.target,
            fell_back: commit.connection.fell_back,
            rationale: candidate.rationale,
            attempts,
            spawned_mover,
            rebalance_error,
        })
    }

    /// PLAN: cached directive, fresh directive, or the built-in default.
    async fn plan(&self, now: Timestamp) -> Result<Directive, MeridianError> {
        if let Some(directive) = self
            .context
            .cached_directive(now, self.settings.planning_interval)
        {
            return Ok(directive);
        }

        let node_count = self.network.read().await.node_count()?;
        match self
            .oracles
            .strategy
            .plan(node_count)
            .await
            .and_then(Directive::validated)
        {
            Ok(directive) => {
                self.context.remember(directive.clone(), now);
                self.network
                    .record(
                        EventKind::Strategy,
                        &format!(
                            "New directive for {}: {} ({})",
                            directive.area, directive.strategy, directive.rationale
                        ),
                    )
                    .await?;
                Ok(directive)
            }
            Err(e) => {
                warn!(error = %e, "Strategy oracle failed, using default directive");
                let directive = Directive::fallback();
                self.network
                    .record(
                        EventKind::Strategy,
                        &format!("Strategy unavailable, using default directive: {}", e),
                    )
                    .await?;
                Ok(directive)
            }
        }
    }

    /// PROPOSE/VERIFY: bounded rounds until a candidate is accepted.
    async fn negotiate(&self, directive: &Directive) -> Result<(Candidate, usize), MeridianError> {
        let mut feedback: Option<String> = None;

        for attempt in 1..=MAX_PROPOSAL_ATTEMPTS {
            let recent = self
                .network
                .read()
                .await
                .recent_nodes(self.settings.recent_node_window)?;
            let candidate = self
                .oracles
                .proposal
                .propose(directive, &recent, feedback.as_deref())
                .await?
                .validated()?;
            self.network
                .record(
                    EventKind::Proposal,
                    &format!(
                        "Attempt {}: {} at ({:.1}, {:.1}): {}",
                        attempt,
                        candidate.name,
                        candidate.position.x,
                        candidate.position.y,
                        candidate.rationale
                    ),
                )
                .await?;

            let nodes = self.network.read().await.nodes()?;
            let verdict = self
                .oracles
                .verification
                .verify(&candidate, &nodes)
                .await?
                .validated();
            self.network
                .record(
                    EventKind::Verification,
                    &format!(
                        "Attempt {}: {} {}: {}",
                        attempt,
                        candidate.name,
                        if verdict.valid { "approved" } else { "rejected" },
                        verdict.feedback
                    ),
                )
                .await?;

            match ProposalOutcome::judge(candidate, verdict) {
                ProposalOutcome::Accepted(candidate) => return Ok((candidate, attempt)),
                ProposalOutcome::Rejected(reason) => {
                    info!(attempt, reason = %reason, "Candidate rejected");
                    feedback = Some(reason);
                }
            }
        }

        Err(MeridianError::Consensus {
            attempts: MAX_PROPOSAL_ATTEMPTS,
            message: feedback.unwrap_or_default(),
        })
    }

    /// Counts, cached directive, and throttle state.
    pub async fn status(&self) -> Result<NetworkStatus, MeridianError> {
        let counts = self.network.counts().await?;
        Ok(NetworkStatus {
            counts,
            persistent: self.network.is_persistent().await,
            directive: self.context.current_directive(),
            next_cycle_in_secs: self
                .context
                .retry_after(self.network.now(), self.settings.cooldown),
        })
    }

    /// Wipe and reseed the network. Drops the cached directive; the throttle
    /// timestamp survives.
    pub async fn reset(&self) -> Result<(), MeridianError> {
        self.network.reset().await?;
        self.context.forget_directive();
        Ok(())
    }
}
