//! # Configuration
//!
//! TOML configuration for the Meridian binary. Every field has a default, so
//! an empty file (or no file at all) yields a working setup with the local
//! oracle and a redb store in the working directory.
//!
//! ```toml
//! [expansion]
//! cooldown_secs = 60
//! planning_interval_secs = 7200
//! recent_node_window = 5
//!
//! [movement]
//! tick_ms = 50
//! time_acceleration = 60.0
//! distance_scale_km = 1.0
//!
//! [fleet]
//! nodes_per_mover = 3
//! min_speed_kmh = 40.0
//! max_speed_kmh = 120.0
//!
//! [oracle]
//! mode = "http"
//! strategy_url = "http://localhost:9000/strategy"
//! proposal_url = "http://localhost:9000/proposal"
//! verification_url = "http://localhost:9000/verification"
//! timeout_secs = 30
//!
//! [storage]
//! backend = "redb"
//! path = "meridian.redb"
//! ```
//!
//! ## Environment Variables
//!
//! - `MERIDIAN_CONFIG`: config file path when `--config` is not given
//! - `MERIDIAN_ORACLE_KEY`: bearer token sent to HTTP oracles

use meridian_core::{
    ExpansionSettings, FleetSettings, MeridianError, MotionSettings, StorageBackend,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MERIDIAN_CONFIG";

/// Environment variable holding the oracle bearer token.
pub const ORACLE_KEY_ENV: &str = "MERIDIAN_ORACLE_KEY";

// =============================================================================
// TOP LEVEL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeridianConfig {
    #[serde(default)]
    pub expansion: ExpansionConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl MeridianConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MeridianError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MeridianError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, MeridianError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MeridianError::Validation(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config path (`--config`, then `MERIDIAN_CONFIG`) and load it.
    ///
    /// A path that does not exist yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MeridianError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        match path {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            Some(path) => {
                tracing::info!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), MeridianError> {
        let invalid = |msg: &str| Err(MeridianError::Validation(msg.to_string()));

        if self.movement.tick_ms == 0 {
            return invalid("movement.tick_ms must be greater than zero");
        }
        if !(self.movement.time_acceleration.is_finite() && self.movement.time_acceleration > 0.0)
        {
            return invalid("movement.time_acceleration must be positive");
        }
        if !(self.movement.distance_scale_km.is_finite() && self.movement.distance_scale_km > 0.0)
        {
            return invalid("movement.distance_scale_km must be positive");
        }
        if self.fleet.nodes_per_mover == 0 {
            return invalid("fleet.nodes_per_mover must be greater than zero");
        }
        let (lo, hi) = (self.fleet.min_speed_kmh, self.fleet.max_speed_kmh);
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
            return invalid("fleet speed range must satisfy 0 < min_speed_kmh <= max_speed_kmh");
        }
        if self.oracle.mode == OracleMode::Http {
            for (name, url) in [
                ("strategy_url", &self.oracle.strategy_url),
                ("proposal_url", &self.oracle.proposal_url),
                ("verification_url", &self.oracle.verification_url),
            ] {
                if url.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                    return Err(MeridianError::Validation(format!(
                        "oracle.{} is required in http mode",
                        name
                    )));
                }
            }
        }
        if self.oracle.timeout_secs == 0 {
            return invalid("oracle.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpansionConfig {
    pub cooldown_secs: u64,
    pub planning_interval_secs: u64,
    pub recent_node_window: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 60,
            planning_interval_secs: 7200,
            recent_node_window: 5,
        }
    }
}

impl ExpansionConfig {
    pub fn settings(&self) -> ExpansionSettings {
        ExpansionSettings {
            cooldown: Duration::from_secs(self.cooldown_secs),
            planning_interval: Duration::from_secs(self.planning_interval_secs),
            recent_node_window: self.recent_node_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovementConfig {
    pub tick_ms: u64,
    pub time_acceleration: f64,
    /// Real-world kilometres per position unit.
    pub distance_scale_km: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            time_acceleration: 60.0,
            distance_scale_km: 1.0,
        }
    }
}

impl MovementConfig {
    pub fn settings(&self) -> MotionSettings {
        MotionSettings {
            tick: Duration::from_millis(self.tick_ms),
            time_acceleration: self.time_acceleration,
            distance_scale_km: self.distance_scale_km,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    pub nodes_per_mover: usize,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            nodes_per_mover: 3,
            min_speed_kmh: 40.0,
            max_speed_kmh: 120.0,
        }
    }
}

impl FleetConfig {
    pub fn settings(&self) -> FleetSettings {
        FleetSettings {
            nodes_per_mover: self.nodes_per_mover,
            min_speed_kmh: self.min_speed_kmh,
            max_speed_kmh: self.max_speed_kmh,
        }
    }
}

/// Which oracle implementation drives expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleMode {
    /// Offline, randomized oracle built into the binary.
    #[default]
    Local,
    /// Remote JSON oracles over HTTP.
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    pub mode: OracleMode,
    pub strategy_url: Option<String>,
    pub proposal_url: Option<String>,
    pub verification_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            mode: OracleMode::Local,
            strategy_url: None,
            proposal_url: None,
            verification_url: None,
            timeout_secs: 30,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Disk-backed redb database.
    #[default]
    Redb,
    /// Volatile in-memory graph.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Redb,
            path: PathBuf::from("meridian.redb"),
        }
    }
}

impl StorageConfig {
    /// Open the configured store.
    pub fn open(&self) -> Result<StorageBackend, MeridianError> {
        match self.backend {
            StorageKind::Redb => StorageBackend::redb(&self.path),
            StorageKind::Memory => Ok(StorageBackend::default()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
