//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::MeridianConfig;
use crate::runtime::Runtime;
use crate::scheduler::spawn_movement;
use meridian_core::{
    CycleReport, MeridianError, MoverId, Network, NodeId, SystemClock, TickReport,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the movement scheduler and the HTTP server; stop both on Ctrl+C.
pub async fn cmd_server(config: MeridianConfig, host: &str, port: u16) -> Result<(), MeridianError> {
    let runtime = Runtime::from_config(config).await?;
    let period = runtime.config.movement.settings().tick;

    println!("Meridian Network Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Storage:  {:?} ({})", runtime.config.storage.backend, runtime.config.storage.path.display());
    println!("  Oracle:   {:?}", runtime.config.oracle.mode);
    println!("  Tick:     {} ms", period.as_millis());
    println!();
    println!("Endpoints:");
    println!("  GET  /health   - Health check");
    println!("  GET  /state    - Full network snapshot");
    println!("  GET  /status   - Network status");
    println!("  POST /expand   - Run one expansion cycle");
    println!("  POST /dispatch - Send a mover towards a node");
    println!("  POST /reset    - Wipe and reseed the network");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = spawn_movement(runtime.engine.clone(), period, shutdown_rx.clone());

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => tracing::error!("Cannot listen for Ctrl+C: {}", e),
        }
        let _ = signal_tx.send(true);
    });

    let addr = format!("{}:{}", host, port);
    let served = api::run_server(&addr, AppState::new(runtime.orchestrator), shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        tracing::warn!("Movement scheduler ended abnormally: {}", e);
    }
    served
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show network status.
pub async fn cmd_status(
    config: MeridianConfig,
    json_mode: bool,
    verbose: bool,
) -> Result<(), MeridianError> {
    let runtime = Runtime::from_config(config).await?;
    let status = runtime.orchestrator.status().await?;

    if json_mode {
        print_json(&status);
        return Ok(());
    }

    println!("Meridian Network Status");
    println!("=======================");
    println!("Nodes:   {}", status.counts.nodes);
    println!("Edges:   {}", status.counts.edges);
    println!(
        "Movers:  {} ({} moving)",
        status.counts.movers, status.counts.moving
    );
    println!(
        "Storage: {}",
        if status.persistent { "persistent" } else { "in-memory" }
    );
    match status.next_cycle_in_secs {
        0 => println!("Next expansion: ready"),
        secs => println!("Next expansion: in {}s", secs),
    }

    if verbose {
        let snapshot = runtime.network.snapshot(0).await?;
        println!();
        println!("Nodes:");
        for node in &snapshot.nodes {
            println!(
                "  {:>4}  {:<28} ({:.1}, {:.1})",
                node.id.0, node.name, node.position.x, node.position.y
            );
        }
        println!("Movers:");
        for mover in &snapshot.movers {
            let place = match (mover.current_node, mover.target_node) {
                (_, Some(target)) => format!("-> node {}", target.0),
                (Some(node), None) => format!("at node {}", node.0),
                (None, None) => "unplaced".to_string(),
            };
            println!(
                "  {:>4}  {:<16} {:>6.1} km/h  {}",
                mover.id.0, mover.name, mover.speed_kmh, place
            );
        }
    }

    Ok(())
}

// =============================================================================
// EXPAND COMMAND
// =============================================================================

/// Run one expansion cycle.
pub async fn cmd_expand(config: MeridianConfig, json_mode: bool) -> Result<(), MeridianError> {
    let runtime = Runtime::from_config(config).await?;
    let result = runtime.orchestrator.run_expansion_cycle().await;
    let report = CycleReport::from(&result);

    if json_mode {
        print_json(&report);
    } else if let Ok(expansion) = &result {
        println!(
            "Built node {} \"{}\" at ({:.1}, {:.1}) after {} attempt(s)",
            expansion.node_id.0,
            expansion.name,
            expansion.position.x,
            expansion.position.y,
            expansion.attempts
        );
        match expansion.connected_to {
            Some(target) if expansion.fell_back => {
                println!("Connected to node {} (fallback)", target.0)
            }
            Some(target) => println!("Connected to node {}", target.0),
            None => println!("No connection (first node)"),
        }
        if let Some(mover) = expansion.spawned_mover {
            println!("Fleet grew: mover {}", mover.0);
        }
        if let Some(error) = &expansion.rebalance_error {
            println!("Fleet rebalance failed: {}", error);
        }
    }

    result.map(|_| ())
}

// =============================================================================
// DISPATCH COMMAND
// =============================================================================

/// Send a mover towards a node.
pub async fn cmd_dispatch(
    config: MeridianConfig,
    json_mode: bool,
    mover: u64,
    target: u64,
) -> Result<(), MeridianError> {
    let runtime = Runtime::from_config(config).await?;
    let receipt = runtime
        .network
        .dispatch(MoverId(mover), NodeId(target))
        .await?;

    if json_mode {
        print_json(&receipt);
        return Ok(());
    }

    println!(
        "{} dispatched to {} ({:.1} km, ETA {} min)",
        receipt.mover_name, receipt.target_name, receipt.distance_km, receipt.eta_minutes
    );
    Ok(())
}

// =============================================================================
// TICK COMMAND
// =============================================================================

/// Run `count` movement ticks back to back.
pub async fn cmd_tick(config: MeridianConfig, json_mode: bool, count: u32) -> Result<(), MeridianError> {
    let runtime = Runtime::from_config(config).await?;

    let mut total = TickReport::default();
    for _ in 0..count {
        let report = runtime.engine.tick().await?;
        total.advanced += report.advanced;
        total.arrived += report.arrived;
        total.skipped += report.skipped;
        total.failed += report.failed;
    }

    if json_mode {
        print_json(&serde_json::json!({ "ticks": count, "report": total }));
        return Ok(());
    }

    println!("Ran {} tick(s)", count);
    println!("  Advanced: {}", total.advanced);
    println!("  Arrived:  {}", total.arrived);
    println!("  Skipped:  {}", total.skipped);
    println!("  Failed:   {}", total.failed);
    Ok(())
}

// =============================================================================
// EVENTS COMMAND
// =============================================================================

/// Show recent audit events.
pub async fn cmd_events(config: MeridianConfig, json_mode: bool, limit: usize) -> Result<(), MeridianError> {
    let runtime = Runtime::from_config(config).await?;
    let events = runtime.network.snapshot(limit).await?.events;

    if json_mode {
        print_json(&events);
        return Ok(());
    }

    if events.is_empty() {
        println!("No events");
    }
    for event in &events {
        println!(
            "{:>6}  {:<12} {}",
            event.id.0,
            event.kind.as_str(),
            event.message
        );
    }
    Ok(())
}

// =============================================================================
// RESET COMMAND
// =============================================================================

/// Wipe and reseed the network.
pub async fn cmd_reset(config: MeridianConfig, json_mode: bool) -> Result<(), MeridianError> {
    let runtime = Runtime::from_config(config).await?;
    runtime.orchestrator.reset().await?;
    let counts = runtime.network.counts().await?;

    if json_mode {
        print_json(&serde_json::json!({ "reset": true, "counts": counts }));
    } else {
        println!(
            "Network reset: {} nodes, {} edges, {} movers",
            counts.nodes, counts.edges, counts.movers
        );
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the store and seed it. Refuses to touch a populated store unless
/// `force` is set.
pub async fn cmd_init(config: MeridianConfig, json_mode: bool, force: bool) -> Result<(), MeridianError> {
    config.validate()?;
    let network = Arc::new(Network::new(
        config.storage.open()?,
        Arc::new(SystemClock),
        config.movement.settings(),
    ));

    let existing = network.counts().await?.nodes;
    if existing > 0 && !force {
        return Err(MeridianError::Validation(format!(
            "store already holds {} nodes; use --force to wipe it",
            existing
        )));
    }
    if existing > 0 {
        network.reset().await?;
    } else {
        network.seed_if_empty().await?;
    }

    let counts = network.counts().await?;
    if json_mode {
        print_json(&serde_json::json!({
            "storage": config.storage.path.to_string_lossy(),
            "persistent": network.is_persistent().await,
            "counts": counts,
        }));
    } else {
        println!("Initialized {}", config.storage.path.display());
        println!(
            "  {} nodes, {} edges, {} movers",
            counts.nodes, counts.edges, counts.movers
        );
    }
    Ok(())
}
