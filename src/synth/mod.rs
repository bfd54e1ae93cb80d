// file: src/synth/mod.rs
// version: 1.0.0
// guid: 61c8e4f2-0b7a-4d35-9e1c-a4f52d8b7e03

//! Command synthesis
//!
//! Builds a runnable clap command from a capability definition and its
//! compiled schema. Synthesis is pure: the cluster is only touched when the
//! handler of a synthesized command runs.

use crate::engine::{
    AttachmentEngine, AttachmentOutcome, AttachmentRequest, DetachmentOutcome, DetachmentRequest,
    WorkloadOutcome, WorkloadRequest,
};
use crate::logging::logger::with_async_operation_span;
use crate::registry::{CapabilityDefinition, CapabilityKind};
use crate::schema::{describe_bindings, CompiledSchema, FlagSpec, FlagValues, ParameterType, Validator};
use crate::{Result, VelaError};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Argument ids of positionals. The colon keeps them apart from parameter
/// names, which cannot contain one.
const APPLICATION_ARG: &str = "target:application";
const COMPONENT_ARG: &str = "target:component";
const APP_FLAG: &str = "target:app";

/// Output streams handed to command handlers
pub struct IoStreams<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> IoStreams<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }
}

/// Where a synthesized command is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandGroup {
    Root,
    Attach,
    Detach,
}

impl CommandGroup {
    /// Name of the parent command, if not mounted at the root
    pub fn parent(&self) -> Option<&'static str> {
        match self {
            CommandGroup::Root => None,
            CommandGroup::Attach => Some("attach"),
            CommandGroup::Detach => Some("detach"),
        }
    }
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.parent().unwrap_or("root"))
    }
}

/// What a synthesized command does when run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityAction {
    CreateWorkload,
    Attach,
    Detach,
}

impl CapabilityAction {
    pub fn group(&self) -> CommandGroup {
        match self {
            CapabilityAction::CreateWorkload => CommandGroup::Root,
            CapabilityAction::Attach => CommandGroup::Attach,
            CapabilityAction::Detach => CommandGroup::Detach,
        }
    }

    /// Definition kind the action operates on
    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityAction::CreateWorkload => CapabilityKind::Workload,
            CapabilityAction::Attach | CapabilityAction::Detach => CapabilityKind::Trait,
        }
    }
}

impl fmt::Display for CapabilityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapabilityAction::CreateWorkload => "create",
            CapabilityAction::Attach => "attach",
            CapabilityAction::Detach => "detach",
        })
    }
}

/// Target and raw flag values of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub application: String,
    pub component: Option<String>,
    pub flags: FlagValues,
}

/// A command ready to be registered on the command tree
pub struct SynthesizedCommand {
    pub name: String,
    pub group: CommandGroup,
    pub command: Command,
    pub handler: CapabilityHandler,
}

impl fmt::Debug for SynthesizedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedCommand")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

/// Runs a synthesized command against the engine
#[derive(Debug, Clone)]
pub struct CapabilityHandler {
    definition: Arc<CapabilityDefinition>,
    action: CapabilityAction,
    validator: Validator,
    flags: Vec<String>,
}

impl CapabilityHandler {
    pub fn definition(&self) -> &CapabilityDefinition {
        &self.definition
    }

    pub fn action(&self) -> CapabilityAction {
        self.action
    }

    /// Extract the target and the flags given on the command line. Values
    /// filled in from defaults are left to the validator.
    pub fn invocation_from_matches(&self, matches: &ArgMatches) -> Result<Invocation> {
        let (application, component) = match self.action {
            CapabilityAction::CreateWorkload => {
                let component = required_value(matches, COMPONENT_ARG, "component")?;
                let application = matches
                    .get_one::<String>(APP_FLAG)
                    .cloned()
                    .unwrap_or_else(|| component.clone());
                (application, Some(component))
            }
            CapabilityAction::Attach | CapabilityAction::Detach => (
                required_value(matches, APPLICATION_ARG, "application")?,
                matches.get_one::<String>(COMPONENT_ARG).cloned(),
            ),
        };

        let mut flags = FlagValues::new();
        for name in &self.flags {
            if matches.value_source(name) != Some(ValueSource::CommandLine) {
                continue;
            }
            let values: Vec<String> = matches
                .get_many::<String>(name)
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            flags.insert(name.clone(), values);
        }

        Ok(Invocation {
            application,
            component,
            flags,
        })
    }

    pub async fn run(
        &self,
        matches: &ArgMatches,
        engine: &AttachmentEngine,
        io: &mut IoStreams<'_>,
    ) -> Result<()> {
        let invocation = self.invocation_from_matches(matches)?;
        self.execute(invocation, engine, io).await
    }

    /// Validate the invocation, delegate to the engine and report
    pub async fn execute(
        &self,
        invocation: Invocation,
        engine: &AttachmentEngine,
        io: &mut IoStreams<'_>,
    ) -> Result<()> {
        let operation = format!("{} {}", self.action, self.definition.name);

        with_async_operation_span(&operation, || async move {
            let params = self.validator.validate(&invocation.flags)?;

            match self.action {
                CapabilityAction::CreateWorkload => {
                    let component = invocation
                        .component
                        .ok_or_else(|| VelaError::validation("a component name is required"))?;
                    let outcome = engine
                        .create_workload(WorkloadRequest {
                            application: invocation.application,
                            component,
                            workload: self.definition.name.clone(),
                            settings: params,
                        })
                        .await?;
                    writeln!(io.out, "{}", workload_summary(&outcome))?;
                }
                CapabilityAction::Attach => {
                    let request = AttachmentRequest::new(
                        &self.definition,
                        invocation.application,
                        invocation.component,
                        params,
                    );
                    let outcome = engine.attach(request).await?;
                    writeln!(io.out, "{}", attach_summary(&outcome))?;
                    for warning in &outcome.warnings {
                        writeln!(io.err, "{} {}", "warning:".yellow().bold(), warning)?;
                    }
                }
                CapabilityAction::Detach => {
                    let outcome = engine
                        .detach(DetachmentRequest {
                            application: invocation.application,
                            component: invocation.component,
                            trait_name: self.definition.name.clone(),
                        })
                        .await?;
                    writeln!(io.out, "{}", detach_summary(&outcome))?;
                }
            }

            Ok::<(), VelaError>(())
        })
        .await
    }
}

fn required_value(matches: &ArgMatches, id: &str, what: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .ok_or_else(|| VelaError::validation(format!("missing {}", what)))
}

pub fn attach_summary(outcome: &AttachmentOutcome) -> String {
    let identity = &outcome.identity;
    let verb = if outcome.replaced() { "Updated" } else { "Attached" };
    let preposition = if outcome.replaced() { "on" } else { "to" };
    let mut line = format!(
        "{} trait {} {} {}/{}",
        verb, identity.name, preposition, identity.application, identity.component
    );
    if !outcome.params.is_empty() {
        line.push_str(&format!(" ({})", describe_bindings(&outcome.params)));
    }
    line
}

pub fn detach_summary(outcome: &DetachmentOutcome) -> String {
    let identity = &outcome.identity;
    match outcome.removed {
        Some(_) => format!(
            "Detached trait {} from {}/{}",
            identity.name, identity.application, identity.component
        ),
        None => format!(
            "Trait {} is not attached to {}/{}; nothing to do",
            identity.name, identity.application, identity.component
        ),
    }
}

pub fn workload_summary(outcome: &WorkloadOutcome) -> String {
    let verb = if outcome.previous.is_some() { "Updated" } else { "Created" };
    format!(
        "{} component {} ({}) in application {}",
        verb, outcome.component, outcome.workload, outcome.application
    )
}

/// Builds commands from definitions
#[derive(Debug, Clone, Default)]
pub struct CommandSynthesizer;

impl CommandSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        definition: &CapabilityDefinition,
        compiled: &CompiledSchema,
        action: CapabilityAction,
    ) -> Result<SynthesizedCommand> {
        if definition.kind != action.kind() {
            return Err(VelaError::definition_invalid(
                &definition.name,
                format!("a {} definition cannot back a {} command", definition.kind, action),
            ));
        }

        let (command, flags, validator) = match action {
            CapabilityAction::CreateWorkload => (
                Command::new(definition.name.clone())
                    .about(definition.summary())
                    .arg(
                        Arg::new(COMPONENT_ARG)
                            .value_name("COMPONENT")
                            .required(true)
                            .help("Component to create or update"),
                    )
                    .arg(
                        Arg::new(APP_FLAG)
                            .short('a')
                            .long("app")
                            .value_name("APPLICATION")
                            .help("Application the component belongs to [default: the component name]"),
                    )
                    .args(compiled.flags.iter().map(flag_arg)),
                flag_names(compiled),
                compiled.validator.clone(),
            ),
            CapabilityAction::Attach => (
                with_target(Command::new(definition.name.clone()).about(definition.summary()))
                    .args(compiled.flags.iter().map(flag_arg)),
                flag_names(compiled),
                compiled.validator.clone(),
            ),
            CapabilityAction::Detach => (
                with_target(
                    Command::new(definition.name.clone())
                        .about(format!("Detach the {} trait from a component", definition.name)),
                ),
                Vec::new(),
                Validator::empty(definition.name.clone()),
            ),
        };

        Ok(SynthesizedCommand {
            name: definition.name.clone(),
            group: action.group(),
            command,
            handler: CapabilityHandler {
                definition: Arc::new(definition.clone()),
                action,
                validator,
                flags,
            },
        })
    }
}

fn flag_names(compiled: &CompiledSchema) -> Vec<String> {
    compiled.flags.iter().map(|flag| flag.name.clone()).collect()
}

fn with_target(command: Command) -> Command {
    command
        .arg(
            Arg::new(APPLICATION_ARG)
                .value_name("APPLICATION")
                .required(true)
                .help("Target application"),
        )
        .arg(
            Arg::new(COMPONENT_ARG)
                .value_name("COMPONENT")
                .help("Target component; may be omitted when the application has one"),
        )
}

/// Values are collected as strings; typing happens in the validator
fn flag_arg(flag: &FlagSpec) -> Arg {
    let mut help = if flag.help.is_empty() {
        format!("{} parameter", flag.kind)
    } else {
        flag.help.clone()
    };
    if flag.mandatory {
        help.push_str(" (required)");
    }

    let mut arg = Arg::new(flag.name.clone()).long(flag.name.clone()).help(help);
    if let Some(short) = flag.short {
        arg = arg.short(short);
    }

    arg = match flag.kind {
        ParameterType::Bool => arg
            .value_name("BOOL")
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .action(ArgAction::Set),
        ParameterType::StringList => arg
            .value_name("VALUES")
            .action(ArgAction::Append)
            .value_delimiter(','),
        ParameterType::Int => arg.value_name("INT").action(ArgAction::Set),
        ParameterType::String => arg.value_name("STRING").action(ArgAction::Set),
    };

    match flag.default.as_ref().map(|value| value.to_flag_value()) {
        Some(rendered) if !rendered.is_empty() => arg.default_value(rendered),
        _ => arg,
    }
}
