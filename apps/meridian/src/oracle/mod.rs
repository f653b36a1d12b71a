//! # Oracle Adapters
//!
//! Concrete implementations of the core oracle traits.
//!
//! - `HttpOracle`: remote JSON oracles, one URL per role
//! - `LocalOracle`: offline, randomized, needs no network

mod http;
mod local;

pub use http::HttpOracle;
pub use local::LocalOracle;

use crate::config::{ORACLE_KEY_ENV, OracleConfig, OracleMode};
use meridian_core::{MeridianError, Oracles};
use std::sync::Arc;

/// Build the oracle set selected by the configuration.
pub fn build_oracles(config: &OracleConfig) -> Result<Oracles, MeridianError> {
    match config.mode {
        OracleMode::Local => {
            tracing::info!("Using local oracle");
            Ok(Oracles::single(Arc::new(LocalOracle::new())))
        }
        OracleMode::Http => {
            let api_key = std::env::var(ORACLE_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
            if api_key.is_none() {
                tracing::warn!(
                    "{} not set, oracle requests are sent without authentication",
                    ORACLE_KEY_ENV
                );
            }
            let oracle = HttpOracle::from_config(config, api_key)?;
            tracing::info!("Using HTTP oracles");
            Ok(Oracles::single(Arc::new(oracle)))
        }
    }
}
