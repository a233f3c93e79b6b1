//! Entry point: parses arguments, installs the tracing subscriber, loads
//! config, and dispatches to a command (spec.md §6 CLI surface).
//!
//! Grounded on the teacher's `cli/run.rs`: parse → build context → dispatch
//! → render errors, adapted from the teacher's synchronous CLI into a
//! `tokio` runtime bridge since every `skilllab-*` operation is async.

use crate::args::{Cli, Commands};
use crate::commands;
use clap::Parser;
use skilllab_config::Config;
use skilllab_errors::UserFriendlyError;
use tracing_subscriber::EnvFilter;

/// Installs the process-wide tracing subscriber (spec.md's ambient logging
/// supplement): `SKILLLAB_LOG`, falling back to `RUST_LOG`, defaulting to
/// `info`; `--json-logs` switches the formatter to newline-delimited JSON.
fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_env("SKILLLAB_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// CLI entry point re-exported as `skilllab::run`.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let (config, source) = Config::discover(cli.config.as_deref())?;
    config.validate()?;
    tracing::info!(?source, "configuration loaded");

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(dispatch(&config, cli.command));

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("error: {}", err.user_message());
            for suggestion in err.suggestions() {
                eprintln!("  hint: {suggestion}");
            }
            Err(anyhow::Error::new(err))
        }
    }
}

async fn dispatch(config: &Config, command: Commands) -> skilllab_errors::Result<()> {
    match command {
        Commands::Run { target } => commands::run(config, target).await,
        Commands::Review { target } => commands::review(config, target).await,
        Commands::Monitor { target } => commands::monitor(config, target).await,
        Commands::Training { target } => commands::training(config, target).await,
        Commands::Health { target } => commands::health(config, target).await,
    }
}
