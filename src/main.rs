// src/main.rs

use brigade::Error;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{InstallFailed, Session};

/// Exit status when concretization fails
const EXIT_UNSATISFIABLE: u8 = 2;
/// Exit status when at least one package failed to build
const EXIT_BUILD_FAILED: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    if let Commands::Completions { shell } = cli.command {
        return commands::cmd_completions(shell);
    }

    let session = Session::open(&global)?;
    match cli.command {
        Commands::Install {
            spec,
            force,
            keep_stage,
        } => commands::cmd_install(&session, &spec, &global, force, keep_stage),
        Commands::Resolve { spec, json } => commands::cmd_resolve(&session, &spec, &global, json),
        Commands::Uninstall { hash, force } => commands::cmd_uninstall(&session, &hash, force),
        Commands::List { package } => commands::cmd_list(&session, package.as_deref()),
        Commands::Env { hash } => commands::cmd_env(&session, &hash),
        Commands::Info { package } => commands::cmd_info(&session, &package),
        Commands::Completions { .. } => Ok(()),
    }
}

fn exit_status(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<InstallFailed>().is_some() {
        return EXIT_BUILD_FAILED;
    }
    match e.downcast_ref::<Error>() {
        Some(err) if err.is_resolution_error() => EXIT_UNSATISFIABLE,
        Some(Error::BuildFailed { .. }) => EXIT_BUILD_FAILED,
        _ => 1,
    }
}
