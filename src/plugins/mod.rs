// file: src/plugins/mod.rs
// version: 1.0.0
// guid: b5e2d9a4-7c31-4f08-96ab-2d4e8c0f1a77

//! Plugin lifecycle
//!
//! Discovers definitions through the registry, compiles and synthesizes a
//! command for each, and registers the results on a command tree builder.
//! A definition that cannot be turned into a command is skipped with a
//! warning; only registry failures abort a load.

use crate::cli::CommandTreeBuilder;
use crate::registry::{CapabilityDefinition, CapabilityKind, DefinitionRegistry};
use crate::schema::SchemaCompiler;
use crate::synth::{CapabilityAction, CommandGroup, CommandSynthesizer};
use crate::{Result, VelaError};
use tracing::{error, info, warn};

/// A definition left out of the command tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDefinition {
    pub name: String,
    pub reason: String,
}

/// Outcome of loading one kind of definition into one command group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub kind: CapabilityKind,
    pub group: CommandGroup,
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedDefinition>,
}

impl LoadReport {
    fn new(action: CapabilityAction) -> Self {
        Self {
            kind: action.kind(),
            group: action.group(),
            loaded: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Name of the definition a definition-level error is about
fn subject(error: &VelaError) -> String {
    match error {
        VelaError::DefinitionInvalid { name, .. } | VelaError::CommandConflict { name } => name.clone(),
        VelaError::SchemaUnsupported { definition, .. } => definition.clone(),
        other => other.to_string(),
    }
}

pub struct PluginLifecycleManager {
    registry: DefinitionRegistry,
    compiler: SchemaCompiler,
    synthesizer: CommandSynthesizer,
}

impl PluginLifecycleManager {
    pub fn new(registry: DefinitionRegistry) -> Self {
        Self {
            registry,
            compiler: SchemaCompiler::new(),
            synthesizer: CommandSynthesizer::new(),
        }
    }

    /// Register one root command per workload definition
    pub async fn load_workload_commands(&self, builder: &mut CommandTreeBuilder) -> Result<LoadReport> {
        self.load(CapabilityAction::CreateWorkload, builder).await
    }

    /// Register one `attach` subcommand per trait definition
    pub async fn load_trait_commands(&self, builder: &mut CommandTreeBuilder) -> Result<LoadReport> {
        self.load(CapabilityAction::Attach, builder).await
    }

    /// Register one `detach` subcommand per trait definition
    pub async fn load_detach_commands(&self, builder: &mut CommandTreeBuilder) -> Result<LoadReport> {
        self.load(CapabilityAction::Detach, builder).await
    }

    /// Load every group. A group whose registry call fails is logged and
    /// left out, so the rest of the tree stays usable.
    pub async fn load_all(&self, builder: &mut CommandTreeBuilder) -> Vec<LoadReport> {
        let mut reports = Vec::with_capacity(3);

        for action in [
            CapabilityAction::CreateWorkload,
            CapabilityAction::Attach,
            CapabilityAction::Detach,
        ] {
            match self.load(action, builder).await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Could not load {} commands: {}", action.group(), e),
            }
        }

        reports
    }

    async fn load(&self, action: CapabilityAction, builder: &mut CommandTreeBuilder) -> Result<LoadReport> {
        let kind = action.kind();
        let entries = self.registry.list_definitions(kind).await?;

        let report = entries.into_iter().try_fold(LoadReport::new(action), |mut report, entry| {
            match entry.and_then(|definition| self.register(&definition, action, builder)) {
                Ok(name) => report.loaded.push(name),
                Err(e) if e.is_definition_level() => {
                    warn!("Skipping {} definition: {}", kind, e);
                    report.skipped.push(SkippedDefinition {
                        name: subject(&e),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
            Ok(report)
        })?;

        info!(
            "Loaded {} {} command(s) into {} group, skipped {}",
            report.loaded.len(),
            kind,
            report.group,
            report.skipped.len()
        );
        Ok(report)
    }

    fn register(
        &self,
        definition: &CapabilityDefinition,
        action: CapabilityAction,
        builder: &mut CommandTreeBuilder,
    ) -> Result<String> {
        let compiled = self.compiler.compile(definition)?;
        let command = self.synthesizer.synthesize(definition, &compiled, action)?;
        let name = command.name.clone();
        builder.add(command)?;
        Ok(name)
    }
}
