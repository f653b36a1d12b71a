//! # meridian
//!
//! The Meridian application: configuration, oracle adapters, the movement
//! scheduler, the HTTP API, and the CLI. All network state and rules live in
//! `meridian-core`; this crate only wires them to the outside world.

pub mod api;
pub mod cli;
pub mod config;
pub mod oracle;
pub mod runtime;
pub mod scheduler;
