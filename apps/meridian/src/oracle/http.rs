//! # HTTP Oracles
//!
//! Posts JSON to the three configured oracle URLs and turns the responses
//! into core values. Responses are parsed into permissive raw shapes first;
//! the core `validated` step decides what is usable.
//!
//! ## Wire format
//!
//! | Role         | Request                                        | Response                                    |
//! |--------------|------------------------------------------------|---------------------------------------------|
//! | strategy     | `{nodeCount}`                                  | `{strategyText, areaLabel, rationale}`      |
//! | proposal     | `{directive, recentNodes, feedback}`           | `{name, x, y, connectToId, rationale}`      |
//! | verification | `{candidate, nodes}`                           | `{valid, feedback}`                         |
//!
//! `connectToId` may be a number, a string, or anything else; it is kept as
//! raw text and resolved against the store at commit time.

use crate::config::OracleConfig;
use async_trait::async_trait;
use meridian_core::{
    Candidate, Directive, MeridianError, Node, OraclePhase, Point, ProposalOracle, StrategyOracle,
    VerificationOracle, Verdict,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

// =============================================================================
// CLIENT ERRORS
// =============================================================================

/// Transport-level failures talking to an oracle.
#[derive(Debug)]
enum ClientError {
    /// Cannot reach the oracle.
    ConnectionFailed(String),
    /// 401 Unauthorized.
    Unauthorized,
    /// 429 Too Many Requests.
    RateLimited,
    /// Non-success status other than the above.
    Status(u16, String),
    /// Response body was not the expected JSON.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => write!(f, "Cannot connect to oracle at {msg}"),
            Self::Unauthorized => write!(f, "Unauthorized: invalid or missing oracle key"),
            Self::RateLimited => write!(f, "Rate limited by oracle"),
            Self::Status(status, msg) => write!(f, "Oracle returned {status}: {msg}"),
            Self::ParseError(msg) => write!(f, "Malformed oracle response: {msg}"),
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawDirective {
    #[serde(rename = "strategyText", alias = "strategy")]
    strategy: String,
    #[serde(default, rename = "areaLabel", alias = "area")]
    area: String,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    name: String,
    x: f64,
    y: f64,
    #[serde(default, rename = "connectToId", alias = "connect_to")]
    connect_to: Option<Value>,
    #[serde(default)]
    rationale: String,
}

impl RawCandidate {
    fn into_candidate(self) -> Candidate {
        Candidate {
            name: self.name,
            position: Point::new(self.x, self.y),
            connect_to: self.connect_to.and_then(raw_hint),
            rationale: self.rationale,
        }
    }
}

/// Flatten a JSON connection hint into text without interpreting it.
///
/// Integral floats such as `2.0` are written as `2` so they read as ids.
fn raw_hint(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_u64() && f.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&f) => {
                Some((f as u64).to_string())
            }
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    valid: bool,
    #[serde(default)]
    feedback: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDirective<'a> {
    strategy_text: &'a str,
    area_label: &'a str,
    rationale: &'a str,
}

impl<'a> From<&'a Directive> for WireDirective<'a> {
    fn from(d: &'a Directive) -> Self {
        Self {
            strategy_text: &d.strategy,
            area_label: &d.area,
            rationale: &d.rationale,
        }
    }
}

#[derive(Serialize)]
struct WireNode<'a> {
    id: u64,
    name: &'a str,
    x: f64,
    y: f64,
}

impl<'a> From<&'a Node> for WireNode<'a> {
    fn from(n: &'a Node) -> Self {
        Self {
            id: n.id.0,
            name: &n.name,
            x: n.position.x,
            y: n.position.y,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate<'a> {
    name: &'a str,
    x: f64,
    y: f64,
    connect_to_id: Option<&'a str>,
    rationale: &'a str,
}

fn wire_nodes(nodes: &[Node]) -> Vec<WireNode<'_>> {
    nodes.iter().map(WireNode::from).collect()
}

// =============================================================================
// HTTP ORACLE
// =============================================================================

/// All three oracle roles backed by HTTP endpoints.
#[derive(Clone)]
pub struct HttpOracle {
    http: reqwest::Client,
    strategy_url: String,
    proposal_url: String,
    verification_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOracle")
            .field("strategy_url", &self.strategy_url)
            .field("proposal_url", &self.proposal_url)
            .field("verification_url", &self.verification_url)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

impl HttpOracle {
    pub fn new(
        strategy_url: impl Into<String>,
        proposal_url: impl Into<String>,
        verification_url: impl Into<String>,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, MeridianError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeridianError::IoError(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            strategy_url: strategy_url.into(),
            proposal_url: proposal_url.into(),
            verification_url: verification_url.into(),
            api_key,
        })
    }

    pub fn from_config(config: &OracleConfig, api_key: Option<String>) -> Result<Self, MeridianError> {
        let url = |name: &str, value: &Option<String>| {
            value.clone().ok_or_else(|| {
                MeridianError::Validation(format!("oracle.{} is required in http mode", name))
            })
        };
        Self::new(
            url("strategy_url", &config.strategy_url)?,
            url("proposal_url", &config.proposal_url)?,
            url("verification_url", &config.verification_url)?,
            Duration::from_secs(config.timeout_secs),
            api_key,
        )
    }

    /// POST `body` to `url` and decode the JSON reply as `T`.
    async fn call<B, T>(&self, phase: OraclePhase, url: &str, body: &B) -> Result<T, MeridianError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let mut req = self.http.post(url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let value = self
            .send(url, req)
            .await
            .map_err(|e| MeridianError::oracle(phase, e.to_string()))?;
        serde_json::from_value(value).map_err(|e| {
            MeridianError::oracle(phase, ClientError::ParseError(e.to_string()).to_string())
        })
    }

    async fn send(&self, url: &str, req: reqwest::RequestBuilder) -> Result<Value, ClientError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{url}: {e}")))?;
        handle_response(resp).await
    }
}

/// Check status codes and parse JSON.
async fn handle_response(resp: reqwest::Response) -> Result<Value, ClientError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ClientError::RateLimited);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Status(status.as_u16(), body));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| ClientError::ParseError(e.to_string()))
}

#[async_trait]
impl StrategyOracle for HttpOracle {
    async fn plan(&self, node_count: usize) -> Result<Directive, MeridianError> {
        let body = serde_json::json!({ "nodeCount": node_count });
        let raw: RawDirective = self
            .call(OraclePhase::Strategy, &self.strategy_url, &body)
            .await?;
        Ok(Directive {
            strategy: raw.strategy,
            area: raw.area,
            rationale: raw.rationale,
        })
    }
}

#[async_trait]
impl ProposalOracle for HttpOracle {
    async fn propose(
        &self,
        directive: &Directive,
        recent: &[Node],
        feedback: Option<&str>,
    ) -> Result<Candidate, MeridianError> {
        let body = serde_json::json!({
            "directive": WireDirective::from(directive),
            "recentNodes": wire_nodes(recent),
            "feedback": feedback,
        });
        let raw: RawCandidate = self
            .call(OraclePhase::Proposal, &self.proposal_url, &body)
            .await?;
        Ok(raw.into_candidate())
    }
}

#[async_trait]
impl VerificationOracle for HttpOracle {
    async fn verify(&self, candidate: &Candidate, nodes: &[Node]) -> Result<Verdict, MeridianError> {
        let body = serde_json::json!({
            "candidate": WireCandidate {
                name: &candidate.name,
                x: candidate.position.x,
                y: candidate.position.y,
                connect_to_id: candidate.connect_to.as_deref(),
                rationale: &candidate.rationale,
            },
            "nodes": wire_nodes(nodes),
        });
        let raw: RawVerdict = self
            .call(OraclePhase::Verification, &self.verification_url, &body)
            .await?;
        Ok(Verdict {
            valid: raw.valid,
            feedback: raw.feedback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(json: Value) -> Candidate {
        serde_json::from_value::<RawCandidate>(json)
            .expect("parse")
            .into_candidate()
    }

    #[test]
    fn numeric_hint_becomes_text() {
        let c = candidate(serde_json::json!({
            "name": "Harbor", "x": 1.0, "y": 2.0, "connectToId": 3, "rationale": "coast"
        }));
        assert_eq!(c.connect_to.as_deref(), Some("3"));
        assert_eq!(c.position, Point::new(1.0, 2.0));
    }

    #[test]
    fn integral_float_hint_reads_as_id() {
        let c = candidate(serde_json::json!({
            "name": "Harbor", "x": 1.0, "y": 2.0, "connectToId": 2.0
        }));
        assert_eq!(c.connect_to.as_deref(), Some("2"));

        let c = candidate(serde_json::json!({
            "name": "Harbor", "x": 1.0, "y": 2.0, "connectToId": 2.5
        }));
        assert_eq!(c.connect_to.as_deref(), Some("2.5"));

        let c = candidate(serde_json::json!({
            "name": "Harbor", "x": 1.0, "y": 2.0, "connectToId": -3
        }));
        assert_eq!(c.connect_to.as_deref(), Some("-3"));
    }

    #[test]
    fn odd_hints_are_kept_raw() {
        let c = candidate(serde_json::json!({
            "name": "Harbor", "x": 0, "y": 0, "connectToId": "abc"
        }));
        assert_eq!(c.connect_to.as_deref(), Some("abc"));

        let c = candidate(serde_json::json!({
            "name": "Harbor", "x": 0, "y": 0, "connectToId": [1, 2]
        }));
        assert_eq!(c.connect_to.as_deref(), Some("[1,2]"));

        let c = candidate(serde_json::json!({
            "name": "Harbor", "x": 0, "y": 0, "connectToId": null
        }));
        assert_eq!(c.connect_to, None);
        assert_eq!(c.rationale, "");
    }

    #[test]
    fn missing_coordinates_fail_to_parse() {
        let raw = serde_json::from_value::<RawCandidate>(serde_json::json!({ "name": "Harbor" }));
        assert!(raw.is_err());
    }

    #[test]
    fn directive_accepts_both_spellings() {
        let camel: RawDirective = serde_json::from_value(serde_json::json!({
            "strategyText": "go north", "areaLabel": "north", "rationale": "why not"
        }))
        .expect("camel");
        assert_eq!(camel.area, "north");
        let snake: RawDirective =
            serde_json::from_value(serde_json::json!({ "strategy": "go east" })).expect("snake");
        assert_eq!(snake.strategy, "go east");
        assert_eq!(snake.area, "");
    }

    #[test]
    fn from_config_requires_urls() {
        let config = OracleConfig::default();
        assert!(matches!(
            HttpOracle::from_config(&config, None),
            Err(MeridianError::Validation(_))
        ));
    }
}
