// file: src/cli/tree.rs
// version: 1.0.0
// guid: 0e8c5b37-d2a1-4f69-8b04-7a93f61c2d58

//! Command tree assembly and dispatch

use super::args::root_command;
use super::commands::Builtin;
use super::CommandContext;
use crate::engine::Rollback;
use crate::synth::{CapabilityHandler, CommandGroup, IoStreams, SynthesizedCommand};
use crate::{Result, VelaError};
use clap::{ArgMatches, Command};
use std::collections::BTreeMap;
use std::ffi::OsString;
use tracing::debug;

type CommandKey = (CommandGroup, String);

/// Collects synthesized commands before the tree is frozen
pub struct CommandTreeBuilder {
    root: Command,
    commands: BTreeMap<CommandKey, SynthesizedCommand>,
}

impl CommandTreeBuilder {
    /// Start from the root command with the built-ins registered
    pub fn new() -> Self {
        let root = Builtin::ALL
            .iter()
            .fold(root_command(), |root, builtin| root.subcommand(builtin.command()));

        Self {
            root,
            commands: BTreeMap::new(),
        }
    }

    /// Register a command; a name already taken in its group is a conflict.
    /// `help` is generated by clap in every group.
    pub fn add(&mut self, command: SynthesizedCommand) -> Result<()> {
        let name = command.name.as_str();
        let reserved = name == "help"
            || (command.group == CommandGroup::Root
                && (Builtin::from_name(name).is_some() || ["attach", "detach"].contains(&name)));
        let key = (command.group, command.name.clone());

        if reserved || self.commands.contains_key(&key) {
            return Err(VelaError::CommandConflict { name: command.name });
        }

        debug!("Registered {} command {}", command.group, command.name);
        self.commands.insert(key, command);
        Ok(())
    }

    pub fn contains(&self, group: CommandGroup, name: &str) -> bool {
        self.commands.contains_key(&(group, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Freeze the tree. The `attach` and `detach` groups only appear when
    /// they have subcommands.
    pub fn build(self) -> CommandTree {
        let mut root = self.root;
        let mut attach = Command::new("attach")
            .about("Attach a trait to an application component")
            .subcommand_required(true)
            .arg_required_else_help(true);
        let mut detach = Command::new("detach")
            .about("Detach a trait from an application component")
            .subcommand_required(true)
            .arg_required_else_help(true);
        let (mut has_attach, mut has_detach) = (false, false);
        let mut handlers = BTreeMap::new();

        for (key, synthesized) in self.commands {
            match key.0 {
                CommandGroup::Root => root = root.subcommand(synthesized.command),
                CommandGroup::Attach => {
                    attach = attach.subcommand(synthesized.command);
                    has_attach = true;
                }
                CommandGroup::Detach => {
                    detach = detach.subcommand(synthesized.command);
                    has_detach = true;
                }
            }
            handlers.insert(key, synthesized.handler);
        }

        if has_attach {
            root = root.subcommand(attach);
        }
        if has_detach {
            root = root.subcommand(detach);
        }

        CommandTree { root, handlers }
    }
}

impl Default for CommandTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The frozen command tree of one invocation
pub struct CommandTree {
    root: Command,
    handlers: BTreeMap<CommandKey, CapabilityHandler>,
}

impl CommandTree {
    pub fn command(&self) -> &Command {
        &self.root
    }

    pub fn handler(&self, group: CommandGroup, name: &str) -> Option<&CapabilityHandler> {
        self.handlers.get(&(group, name.to_string()))
    }

    /// Parse arguments (including the program name) and run the selected
    /// command
    pub async fn dispatch<I, T>(
        &self,
        args: I,
        ctx: &CommandContext,
        io: &mut IoStreams<'_>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.root.clone().try_get_matches_from(args)?;
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| VelaError::validation("no command given"))?;

        if let Some(builtin) = Builtin::from_name(name) {
            if builtin.mutates() {
                return builtin.run(sub, ctx, io).await;
            }
            return tokio::select! {
                biased;
                _ = ctx.interrupt.triggered() => Err(VelaError::Interrupted {
                    identity: format!("{} command", name),
                    rollback: Rollback::NotNeeded.to_string(),
                }),
                result = builtin.run(sub, ctx, io) => result,
            };
        }

        let (group, name, matches) = match name {
            "attach" => nested(CommandGroup::Attach, sub)?,
            "detach" => nested(CommandGroup::Detach, sub)?,
            other => (CommandGroup::Root, other, sub),
        };

        let handler = self
            .handler(group, name)
            .ok_or_else(|| VelaError::validation(format!("unknown command {}", name)))?;
        debug!("Dispatching {} command {}", group, name);
        handler.run(matches, &ctx.engine, io).await
    }
}

fn nested(group: CommandGroup, matches: &ArgMatches) -> Result<(CommandGroup, &str, &ArgMatches)> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| VelaError::validation(format!("{} needs a trait name", group)))?;
    Ok((group, name, sub))
}
