// file: src/cli/mod.rs
// version: 2.0.0
// guid: e5f6g7h8-i9j0-1234-5678-901234efghij

//! Command line interface for vela

pub mod args;
pub mod commands;
pub mod tree;

pub use args::{root_command, GlobalArgs};
pub use commands::Builtin;
pub use tree::{CommandTree, CommandTreeBuilder};

use crate::cluster::ClusterClient;
use crate::engine::{AttachmentEngine, Interrupt};
use crate::registry::DefinitionRegistry;
use std::sync::Arc;

/// Services shared by every command of one invocation
#[derive(Clone)]
pub struct CommandContext {
    pub cluster: Arc<dyn ClusterClient>,
    pub registry: DefinitionRegistry,
    pub engine: AttachmentEngine,
    pub interrupt: Interrupt,
}

impl CommandContext {
    pub fn new(cluster: Arc<dyn ClusterClient>, interrupt: Interrupt) -> Self {
        Self {
            registry: DefinitionRegistry::new(cluster.clone()),
            engine: AttachmentEngine::new(cluster.clone()).with_interrupt(interrupt.clone()),
            cluster,
            interrupt,
        }
    }
}
