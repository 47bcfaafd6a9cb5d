//! # topomap: home-automation topology mapper
//!
//! Composition root and command line.
//!
//! ## Responsibilities
//! - Parse configuration (CLI flags, env vars, config file)
//! - Initialize logging
//! - Construct adapters and inject them into the build service
//! - Run one command and map its outcome to an exit code
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer, no domain logic belongs here.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod exit;
mod wiring;

use config::{Config, DEFAULT_CONFIG_FILE};
use exit::Status;

#[derive(Debug, Parser)]
#[command(name = "topomap")]
#[command(version, about = "Map a home-automation topology into a versioned manifest", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Discover the topology and write a new manifest generation
    Build(commands::build::BuildArgs),
    /// Re-check a manifest artifact directory for consistency
    Validate(commands::validate::ValidateArgs),
    /// Compare two manifests
    Diff(commands::diff::DiffArgs),
    /// Summarize a manifest
    Stats(commands::stats::StatsArgs),
    /// Render templates for every entity of a manifest
    Render(commands::render::RenderArgs),
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {:#}", anyhow::Error::from(err));
            return Status::Fatal.into();
        }
    };
    init_tracing(&config.logging.filter);

    let result = match cli.command {
        Commands::Build(args) => commands::build::execute(args, &config).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Diff(args) => commands::diff::execute(args).await,
        Commands::Stats(args) => commands::stats::execute(args).await,
        Commands::Render(args) => commands::render::execute(args).await,
    };

    match result {
        Ok(status) => status.into(),
        Err(err) => {
            eprintln!("error: {err:#}");
            Status::from_error(&err).into()
        }
    }
}
