//! # Runtime
//!
//! Wires configuration into a running system: one shared [`Network`], the
//! orchestrator that grows it, and the engine that moves its fleet.

use crate::config::MeridianConfig;
use crate::oracle::build_oracles;
use meridian_core::{
    Clock, FleetBalancer, MeridianError, MovementEngine, Network, Oracles, Orchestrator,
    StorageBackend, SystemClock,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Runtime {
    pub network: Arc<Network>,
    pub orchestrator: Arc<Orchestrator>,
    pub engine: MovementEngine,
    pub config: MeridianConfig,
}

impl Runtime {
    /// Validate `config`, open its store, seed it if empty, and build the
    /// configured oracles.
    pub async fn from_config(config: MeridianConfig) -> Result<Self, MeridianError> {
        config.validate()?;
        let backend = config.storage.open()?;
        let oracles = build_oracles(&config.oracle)?;
        Self::assemble(config, backend, oracles, Arc::new(SystemClock)).await
    }

    /// Build a runtime from explicit parts. Seeds the store if it is empty.
    pub async fn assemble(
        config: MeridianConfig,
        backend: StorageBackend,
        oracles: Oracles,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MeridianError> {
        let network = Arc::new(Network::new(backend, clock, config.movement.settings()));
        network.seed_if_empty().await?;

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&network),
            oracles,
            FleetBalancer::new(config.fleet.settings()),
            config.expansion.settings(),
        ));
        let engine = MovementEngine::new(Arc::clone(&network));

        Ok(Self {
            network,
            orchestrator,
            engine,
            config,
        })
    }
}
