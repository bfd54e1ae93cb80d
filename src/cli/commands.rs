// file: src/cli/commands.rs
// version: 2.0.0
// guid: g7h8i9j0-k1l2-3456-7890-123456ghijkl

//! Built-in commands

use super::CommandContext;
use crate::cluster::{AppPhase, Application};
use crate::registry::{validate_target_name, CapabilityDefinition, CapabilityKind};
use crate::schema::describe_bindings;
use crate::synth::IoStreams;
use crate::{Result, VelaError};
use clap::{Arg, ArgMatches, Command};
use colored::{ColoredString, Colorize};
use std::io::Write;
use tracing::{info, warn};

/// Commands that exist regardless of the definitions in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Workloads,
    Traits,
    Apps,
    Status,
    Delete,
    Version,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Workloads,
        Builtin::Traits,
        Builtin::Apps,
        Builtin::Status,
        Builtin::Delete,
        Builtin::Version,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Workloads => "workloads",
            Builtin::Traits => "traits",
            Builtin::Apps => "apps",
            Builtin::Status => "status",
            Builtin::Delete => "delete",
            Builtin::Version => "version",
        }
    }

    /// Whether the command writes to the cluster. Writes run to completion
    /// even when interrupted.
    pub fn mutates(&self) -> bool {
        matches!(self, Builtin::Delete)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn command(&self) -> Command {
        match self {
            Builtin::Workloads => Command::new("workloads")
                .about("List workload types, or show the parameters of one")
                .arg(Arg::new("name").value_name("NAME").help("Workload definition to show")),
            Builtin::Traits => Command::new("traits")
                .about("List traits, or show the parameters of one")
                .arg(Arg::new("name").value_name("NAME").help("Trait definition to show")),
            Builtin::Apps => Command::new("apps").about("List applications"),
            Builtin::Status => Command::new("status")
                .about("Show the components and traits of an application")
                .arg(Arg::new("app").value_name("APPLICATION").required(true)),
            Builtin::Delete => Command::new("delete")
                .about("Delete an application")
                .arg(Arg::new("app").value_name("APPLICATION").required(true)),
            Builtin::Version => Command::new("version").about("Print version information"),
        }
    }

    pub async fn run(
        &self,
        matches: &ArgMatches,
        ctx: &CommandContext,
        io: &mut IoStreams<'_>,
    ) -> Result<()> {
        match self {
            Builtin::Workloads => {
                catalog_command(CapabilityKind::Workload, matches.get_one::<String>("name"), ctx, io).await
            }
            Builtin::Traits => {
                catalog_command(CapabilityKind::Trait, matches.get_one::<String>("name"), ctx, io).await
            }
            Builtin::Apps => apps_command(ctx, io).await,
            Builtin::Status => status_command(app_arg(matches)?, ctx, io).await,
            Builtin::Delete => delete_command(app_arg(matches)?, ctx, io).await,
            Builtin::Version => {
                writeln!(io.out, "vela {}", crate::VERSION)?;
                writeln!(io.out, "Cluster backend: {}", ctx.cluster.backend_name())?;
                Ok(())
            }
        }
    }
}

fn app_arg(matches: &ArgMatches) -> Result<&str> {
    let name = matches
        .get_one::<String>("app")
        .map(String::as_str)
        .ok_or_else(|| VelaError::validation("an application name is required"))?;
    validate_target_name("application", name)?;
    Ok(name)
}

fn phase_label(phase: AppPhase) -> ColoredString {
    let label = format!("{:<10}", phase.as_str());
    match phase {
        AppPhase::Running => label.green(),
        AppPhase::Pending => label.yellow(),
        AppPhase::Failed => label.red(),
        AppPhase::Deleting => label.dimmed(),
    }
}

fn render_default(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// List definitions of a kind, or show one in detail
async fn catalog_command(
    kind: CapabilityKind,
    name: Option<&String>,
    ctx: &CommandContext,
    io: &mut IoStreams<'_>,
) -> Result<()> {
    if let Some(name) = name {
        let definition = ctx.registry.get_definition(kind, name).await?;
        return show_definition(&definition, io);
    }

    let mut definitions = Vec::new();
    for entry in ctx.registry.list_definitions(kind).await? {
        match entry {
            Ok(definition) => definitions.push(definition),
            Err(e) => warn!("Ignoring {} definition: {}", kind, e),
        }
    }

    if definitions.is_empty() {
        writeln!(io.out, "No {} definitions found", kind)?;
        return Ok(());
    }

    match kind {
        CapabilityKind::Workload => {
            writeln!(
                io.out,
                "{}",
                format!("{:<20} {:<44} {}", "NAME", "DEFINITION", "DESCRIPTION").bold()
            )?;
            writeln!(io.out, "{:-<88}", "")?;
            for definition in &definitions {
                writeln!(
                    io.out,
                    "{:<20} {:<44} {}",
                    definition.name,
                    definition.template.resource,
                    definition.summary()
                )?;
            }
        }
        CapabilityKind::Trait => {
            writeln!(
                io.out,
                "{}",
                format!("{:<20} {:<24} {}", "NAME", "APPLIES TO", "DESCRIPTION").bold()
            )?;
            writeln!(io.out, "{:-<88}", "")?;
            for definition in &definitions {
                let applies_to = if definition.applies_to.is_empty() {
                    "*".to_string()
                } else {
                    definition.applies_to.join(",")
                };
                writeln!(
                    io.out,
                    "{:<20} {:<24} {}",
                    definition.name,
                    applies_to,
                    definition.summary()
                )?;
            }
        }
    }

    info!("Found {} {} definitions", definitions.len(), kind);
    Ok(())
}

fn show_definition(definition: &CapabilityDefinition, io: &mut IoStreams<'_>) -> Result<()> {
    writeln!(io.out, "Name:        {}", definition.name)?;
    writeln!(io.out, "Kind:        {}", definition.kind)?;
    writeln!(io.out, "Definition:  {}", definition.template.resource)?;
    if definition.kind == CapabilityKind::Trait {
        let applies_to = if definition.applies_to.is_empty() {
            "any workload".to_string()
        } else {
            definition.applies_to.join(", ")
        };
        writeln!(io.out, "Applies to:  {}", applies_to)?;
    }
    writeln!(io.out, "Description: {}", definition.summary())?;

    if definition.parameters.is_empty() {
        writeln!(io.out, "\nNo parameters")?;
        return Ok(());
    }

    writeln!(io.out, "\nParameters:")?;
    writeln!(
        io.out,
        "{}",
        format!(
            "{:<20} {:<12} {:<9} {:<12} {}",
            "NAME", "TYPE", "REQUIRED", "DEFAULT", "USAGE"
        )
        .bold()
    )?;
    for param in &definition.parameters {
        let name = match param.short {
            Some(short) => format!("{} (-{})", param.name, short),
            None => param.name.clone(),
        };
        writeln!(
            io.out,
            "{:<20} {:<12} {:<9} {:<12} {}",
            name,
            param.type_tag,
            if param.required { "yes" } else { "no" },
            param.default.as_ref().map(render_default).unwrap_or_else(|| "-".to_string()),
            param.usage
        )?;
    }

    Ok(())
}

async fn apps_command(ctx: &CommandContext, io: &mut IoStreams<'_>) -> Result<()> {
    let mut apps = ctx.cluster.list_applications().await?;
    if apps.is_empty() {
        writeln!(io.out, "No applications found")?;
        return Ok(());
    }
    apps.sort_by(|a, b| a.name.cmp(&b.name));

    writeln!(
        io.out,
        "{}",
        format!("{:<20} {:<10} {:<36} {}", "NAME", "PHASE", "COMPONENTS", "CREATED").bold()
    )?;
    writeln!(io.out, "{:-<88}", "")?;
    for app in &apps {
        let components = app
            .components
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            io.out,
            "{:<20} {} {:<36} {}",
            app.name,
            phase_label(app.phase),
            components,
            created(app)
        )?;
    }

    Ok(())
}

fn created(app: &Application) -> String {
    app.created_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn status_command(name: &str, ctx: &CommandContext, io: &mut IoStreams<'_>) -> Result<()> {
    let app = ctx
        .cluster
        .get_application(name)
        .await?
        .ok_or_else(|| VelaError::target_not_found(format!("application {}", name)))?;

    writeln!(io.out, "Application: {}", app.name.bold())?;
    writeln!(io.out, "Phase:       {}", phase_label(app.phase))?;
    writeln!(io.out, "Created:     {}", created(&app))?;

    if app.components.is_empty() {
        writeln!(io.out, "No components")?;
        return Ok(());
    }

    writeln!(io.out, "Components:")?;
    for component in &app.components {
        writeln!(io.out, "  {} ({})", component.name, component.workload)?;
        if !component.settings.is_empty() {
            writeln!(io.out, "    settings: {}", describe_bindings(&component.settings))?;
        }
        for binding in &component.traits {
            writeln!(
                io.out,
                "    trait {}: {}",
                binding.name,
                describe_bindings(&binding.properties)
            )?;
        }
    }

    Ok(())
}

async fn delete_command(name: &str, ctx: &CommandContext, io: &mut IoStreams<'_>) -> Result<()> {
    if ctx.cluster.get_application(name).await?.is_none() {
        return Err(VelaError::target_not_found(format!("application {}", name)));
    }

    ctx.cluster.delete_application(name).await?;
    info!("Deleted application {}", name);
    writeln!(io.out, "Deleted application {}", name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterClient, Component, MemoryCluster, TraitBinding};
    use crate::engine::Interrupt;
    use crate::schema::{ParamValue, ParameterBindings};
    use std::sync::Arc;

    async fn context_with_shop() -> (Arc<MemoryCluster>, CommandContext) {
        let cluster = Arc::new(MemoryCluster::new());
        let mut properties = ParameterBindings::new();
        properties.insert("replicas".to_string(), ParamValue::Int(3));
        let mut app = Application::new("shop");
        app.phase = AppPhase::Running;
        app.components.push(Component {
            name: "web".to_string(),
            workload: "containerized".to_string(),
            settings: ParameterBindings::new(),
            traits: vec![TraitBinding {
                name: "scaler".to_string(),
                properties,
            }],
        });
        cluster.apply_application(&app).await.unwrap();
        let ctx = CommandContext::new(cluster.clone(), Interrupt::never());
        (cluster, ctx)
    }

    async fn run(builtin: Builtin, args: &[&str], ctx: &CommandContext) -> (Result<()>, String) {
        let matches = builtin
            .command()
            .try_get_matches_from(std::iter::once(builtin.name()).chain(args.iter().copied()))
            .unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = builtin
            .run(&matches, ctx, &mut IoStreams::new(&mut out, &mut err))
            .await;
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_builtin_names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
            builtin.command().debug_assert();
        }
        assert_eq!(Builtin::from_name("attach"), None);
    }

    #[tokio::test]
    async fn test_status_lists_traits() {
        // Arrange
        let (_cluster, ctx) = context_with_shop().await;

        // Act
        let (result, out) = run(Builtin::Status, &["shop"], &ctx).await;

        // Assert
        result.unwrap();
        assert!(out.contains("web (containerized)"));
        assert!(out.contains("trait scaler: replicas=3"));
    }

    #[tokio::test]
    async fn test_status_of_missing_app() {
        let (_cluster, ctx) = context_with_shop().await;

        let (result, _) = run(Builtin::Status, &["cart"], &ctx).await;

        assert!(matches!(result, Err(VelaError::TargetNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_application() {
        let (cluster, ctx) = context_with_shop().await;

        let (result, out) = run(Builtin::Delete, &["shop"], &ctx).await;

        result.unwrap();
        assert_eq!(out.trim(), "Deleted application shop");
        assert!(cluster.get_application("shop").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let (_cluster, ctx) = context_with_shop().await;

        let (result, out) = run(Builtin::Traits, &[], &ctx).await;

        result.unwrap();
        assert_eq!(out.trim(), "No trait definitions found");
    }

    #[tokio::test]
    async fn test_apps_lists_names() {
        let (_cluster, ctx) = context_with_shop().await;

        let (result, out) = run(Builtin::Apps, &[], &ctx).await;

        result.unwrap();
        assert!(out.contains("shop"));
        assert!(out.contains("web"));
    }
}
