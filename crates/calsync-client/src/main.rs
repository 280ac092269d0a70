//! calsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use calsync_client::cli::{Cli, Command, ConfigAction};
use calsync_client::commands::{self, Context};
use calsync_client::error::ClientResult;
use calsync_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let context = match Context::load(cli.config.clone()) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracing_config = if cli.debug || context.config.debug {
        TracingConfig::cli_debug()
    } else {
        match cli.command {
            Command::Watch { json_logs: true } => TracingConfig::daemon(),
            Command::Watch { json_logs: false } => TracingConfig::default(),
            _ => TracingConfig::default().with_level(Level::WARN),
        }
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli.command, context).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, context: Context) -> ClientResult<()> {
    match command {
        Command::Sync { force } => commands::sync::run(&*context.orchestrator()?, force).await,
        Command::Clear { yes } => commands::clear::run(&*context.orchestrator()?, yes).await,
        Command::Watch { .. } => commands::watch::run(context.orchestrator()?).await,
        Command::List { source, limit } => {
            commands::list::run(&*context.orchestrator()?, source.as_deref(), limit)
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&context.config, &context.config_path),
            ConfigAction::Validate => commands::config::validate(&context.config),
            ConfigAction::Path => commands::config::path(&context.config, &context.config_path),
        },
        Command::Version => commands::version::run(),
    }
}
