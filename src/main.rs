// file: src/main.rs
// version: 2.0.0
// guid: h8i9j0k1-l2m3-4567-8901-234567hijklm

//! vela - Main entry point

use colored::Colorize;
use std::ffi::OsString;
use tokio::signal;
use tracing::{debug, warn};
use vela::{
    cli::{CommandContext, CommandTree, CommandTreeBuilder, GlobalArgs},
    cluster,
    config::ConfigLoader,
    engine::Interrupt,
    logging::{init_logger, logger::with_async_operation_span},
    plugins::PluginLifecycleManager,
    synth::IoStreams,
    Result, VelaError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<OsString> = std::env::args_os().collect();
    let globals = GlobalArgs::bootstrap(args.iter().cloned());

    let code = match run(args, globals).await {
        Ok(()) => 0,
        Err(VelaError::Cli(e)) => e.exit(),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(args: Vec<OsString>, globals: GlobalArgs) -> Result<()> {
    let config = ConfigLoader::new().load(globals.config.as_deref())?;
    init_logger(globals.verbose, globals.quiet, &config.logging)?;

    let cluster = cluster::connect(&config.cluster).await?;

    // First Ctrl+C lets in-flight requests roll back; a second one exits
    let (trigger, interrupt) = Interrupt::channel();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Received Ctrl+C, stopping after rollback...");
        trigger.trigger();

        if signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let context = CommandContext::new(cluster, interrupt);
    let tree = with_async_operation_span("load-commands", || load_commands(&context)).await;

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let (mut out, mut err) = (stdout.lock(), stderr.lock());
    tree.dispatch(args, &context, &mut IoStreams::new(&mut out, &mut err))
        .await
}

/// Build the command tree; groups whose definitions cannot be listed are
/// left out
async fn load_commands(context: &CommandContext) -> CommandTree {
    let manager = PluginLifecycleManager::new(context.registry.clone());
    let mut builder = CommandTreeBuilder::new();

    for report in manager.load_all(&mut builder).await {
        debug!(
            "{} group: loaded {:?}, skipped {}",
            report.group,
            report.loaded,
            report.skipped.len()
        );
    }

    builder.build()
}
