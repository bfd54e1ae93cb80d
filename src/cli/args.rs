// file: src/cli/args.rs
// version: 2.0.0
// guid: f6g7h8i9-j0k1-2345-6789-012345fghijk

//! Command line argument definitions

use clap::{value_parser, Arg, ArgAction, Command, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Root command with the global flags. Subcommands are added by the command
/// tree builder.
pub fn root_command() -> Command {
    Command::new("vela")
        .about("Manage applications and their capabilities on a cluster-native platform")
        .version(crate::VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable debug logging"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only log errors"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .global(true)
                .help("Configuration file [default: <config dir>/vela/config.toml]"),
        )
}

/// Global flags read before the command tree exists, so that configuration
/// and logging can be set up before definitions are fetched. Only flags that
/// precede the subcommand are seen here.
#[derive(Parser, Debug, Default, Clone, PartialEq, Eq)]
#[command(
    name = "vela",
    disable_help_flag = true,
    disable_version_flag = true,
    ignore_errors = true,
    allow_external_subcommands = true
)]
pub struct GlobalArgs {
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    rest: Option<Rest>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Rest {
    #[command(external_subcommand)]
    Command(Vec<OsString>),
}

impl GlobalArgs {
    /// Parse leniently; anything unrecognized is left to the full parse
    pub fn bootstrap<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).unwrap_or_default()
    }
}
