//! ivrl CLI - Implied volatility RL environment and bandit demo
//!
//! `ivrl run` drives the environment against an inference server and a
//! trainer, `ivrl evaluate` scores the held-out split once, and
//! `ivrl bandit` runs the two-action policy-gradient demo.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::too_many_lines)]

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use ivrl_core::util::load_env_file;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use crate::commands::{bandit, config as config_cmd, evaluate, run};
use crate::config::{Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "ivrl")]
#[command(author, version, about = "ivrl - implied volatility RL environment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to IVRL_CONFIG, ./ivrl.toml, ~/.config/ivrl/ivrl.toml)
    #[arg(short, long, global = true, env = "IVRL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run training steps against the inference server
    Run(run::RunArgs),

    /// Score the held-out split once
    Evaluate,

    /// Run the two-action bandit demo
    Bandit(bandit::BanditArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from ivrl.env file (before parsing args)
    load_env_file();

    let cli = Cli::parse();
    let config_path = Config::resolve_path(cli.config.as_deref())?;
    let config = Config::load_from(config_path.as_deref())?;

    init_tracing(&config.logging, cli.verbose);

    match &config_path {
        Some(path) => tracing::debug!("Loaded config from: {:?}", path),
        None => tracing::debug!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Run(args) => run::run(args, config).await,
        Commands::Evaluate => evaluate::run(config).await,
        Commands::Bandit(args) => bandit::run(args, config),
        Commands::Config(cmd) => config_cmd::run(cmd, config, cli.config.as_deref()),
    }
}

/// Initialize tracing with optional file logging
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("ivrl={level},ivrl_cli={level},ivrl_env={level},ivrl_bandit={level},ivrl_core={level}")
            .into()
    });

    if logging.log_file.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return;
    }

    let log_path = Path::new(&logging.log_file);
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_filename = log_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("ivrl.log");

    match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                .init();

            // Keep guard alive for the whole process
            Box::leak(Box::new(guard));
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            eprintln!(
                "Warning: Could not set up file logging to '{}': {}. Using stdout only.",
                logging.log_file, e
            );
        }
    }
}
