// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # vela
//!
//! Command line for a cluster-native application platform. Workload and
//! trait definitions stored in the cluster are discovered at startup and
//! turned into typed subcommands; trait commands attach or detach
//! capabilities on live application components with confirmation and
//! rollback.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod plugins;
pub mod registry;
pub mod schema;
pub mod synth;

pub use error::{Result, VelaError};

/// Version information for the command line
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
