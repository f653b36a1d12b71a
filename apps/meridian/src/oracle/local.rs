//! # Local Oracle
//!
//! An offline stand-in for all three oracle roles. Directives pick a compass
//! area at random, proposals land 40 to 120 units from a recent node in that
//! direction, and verification rejects reused names and crowded positions.

use async_trait::async_trait;
use meridian_core::{
    Candidate, Directive, MeridianError, Node, Point, ProposalOracle, StrategyOracle,
    VerificationOracle, Verdict,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::sync::Mutex;

/// Candidates closer than this to an existing node are rejected.
pub const MIN_SEPARATION: f64 = 20.0;

const MIN_OFFSET: f64 = 40.0;
const MAX_OFFSET: f64 = 120.0;

const AREAS: [&str; 5] = ["north", "east", "south", "west", "frontier"];

const PREFIXES: [&str; 8] = [
    "Amber", "Cedar", "Granite", "Harbor", "Juniper", "Maple", "Silver", "Willow",
];
const SUFFIXES: [&str; 6] = ["Crossing", "Junction", "Landing", "Point", "Ridge", "Yard"];

/// Heading in radians for a compass area, `None` for anything else.
fn heading(area: &str) -> Option<f64> {
    match area.to_ascii_lowercase().as_str() {
        "north" => Some(FRAC_PI_2),
        "east" => Some(0.0),
        "south" => Some(-FRAC_PI_2),
        "west" => Some(PI),
        _ => None,
    }
}

#[derive(Debug)]
pub struct LocalOracle {
    rng: Mutex<StdRng>,
}

impl Default for LocalOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalOracle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic oracle for tests.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

#[async_trait]
impl StrategyOracle for LocalOracle {
    async fn plan(&self, node_count: usize) -> Result<Directive, MeridianError> {
        let area = self.with_rng(|rng| AREAS.choose(rng).copied().unwrap_or("frontier"));
        Ok(Directive {
            strategy: format!("Push the network {} from its newest hubs", area),
            area: area.to_string(),
            rationale: format!("{} nodes so far, coverage is thin towards the {}", node_count, area),
        })
    }
}

#[async_trait]
impl ProposalOracle for LocalOracle {
    async fn propose(
        &self,
        directive: &Directive,
        recent: &[Node],
        feedback: Option<&str>,
    ) -> Result<Candidate, MeridianError> {
        let (name, position, anchor) = self.with_rng(|rng| {
            let anchor = recent.choose(rng);
            let origin = anchor.map(|n| n.position).unwrap_or(Point::new(0.0, 0.0));
            let angle = match heading(&directive.area) {
                Some(h) => h + rng.gen_range(-FRAC_PI_4..FRAC_PI_4),
                None => rng.gen_range(-PI..PI),
            };
            // Push further out after a rejection.
            let reach = if feedback.is_some() { 1.5 } else { 1.0 };
            let distance = rng.gen_range(MIN_OFFSET..MAX_OFFSET) * reach;
            let position = Point::new(
                origin.x + distance * angle.cos(),
                origin.y + distance * angle.sin(),
            );
            let name = format!(
                "{} {} {}",
                PREFIXES.choose(rng).copied().unwrap_or("New"),
                SUFFIXES.choose(rng).copied().unwrap_or("Point"),
                rng.gen_range(1..1000)
            );
            (name, position, anchor)
        });

        Ok(Candidate {
            name,
            position,
            connect_to: anchor.map(|n| n.id.0.to_string()),
            rationale: match anchor {
                Some(n) => format!("Extends {} towards the {}", n.name, directive.area),
                None => "First node of the network".to_string(),
            },
        })
    }
}

#[async_trait]
impl VerificationOracle for LocalOracle {
    async fn verify(&self, candidate: &Candidate, nodes: &[Node]) -> Result<Verdict, MeridianError> {
        if let Some(dup) = nodes
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(candidate.name.trim()))
        {
            return Ok(Verdict {
                valid: false,
                feedback: format!("The name {} is already used by node {}", dup.name, dup.id),
            });
        }
        if let Some(near) = nodes
            .iter()
            .find(|n| n.position.distance_to(candidate.position) < MIN_SEPARATION)
        {
            return Ok(Verdict {
                valid: false,
                feedback: format!(
                    "Too close to {} ({:.1} units, minimum {})",
                    near.name,
                    near.position.distance_to(candidate.position),
                    MIN_SEPARATION
                ),
            });
        }
        Ok(Verdict {
            valid: true,
            feedback: "Location is clear".to_string(),
        })
    }
}
