//! taskpilot: task-tracking assistant
//!
//! Thin command-line front end over the unified AI service layer.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use taskpilot_core::{find_project_root, AiServices, ConfigStore};
use tracing_subscriber::EnvFilter;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_root = match &cli.project_root {
        Some(root) => root.clone(),
        None => find_project_root(&std::env::current_dir()?),
    };

    init_logging(cli.verbose, &project_root);

    let debug = cli.debug;
    if let Err(err) = run(cli, project_root).await {
        if debug {
            eprintln!("Error: {err:?}");
        } else {
            eprintln!("Error: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli, project_root: PathBuf) -> anyhow::Result<()> {
    let ai = AiServices::with_defaults();

    match cli.command {
        Commands::Models(args) => {
            commands::models::run(&args, &project_root, ai.runner().registry())
        }
        Commands::Generate { call, json } => {
            commands::generate::run(&ai, call.into_params(project_root), json).await
        }
        Commands::Stream { call } => {
            commands::stream::run(&ai, call.into_params(project_root)).await
        }
        Commands::Object { call, schema, name } => {
            commands::object::run(&ai, call.into_params(project_root), &schema, name).await
        }
    }
}

/// Install the tracing subscriber on stderr.
///
/// `--verbose` wins, then the project's `global.logLevel`. `RUST_LOG`
/// overrides both.
fn init_logging(verbose: bool, project_root: &Path) {
    let level = if verbose {
        "debug".to_string()
    } else {
        ConfigStore::for_project(project_root)
            .load()
            .ok()
            .map(|config| {
                if config.global.debug {
                    "debug".to_string()
                } else {
                    config.global.log_level.to_lowercase()
                }
            })
            .filter(|level| LOG_LEVELS.contains(&level.as_str()))
            .unwrap_or_else(|| "warn".to_string())
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("taskpilot={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
