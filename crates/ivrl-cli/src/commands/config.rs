//! Configuration management commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{Config, CONFIG_FILE_NAME};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a configuration file with default values
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub fn run(cmd: ConfigCommands, config: Config, explicit: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(&config, explicit),
        ConfigCommands::Init { force } => {
            let path = explicit.map_or_else(|| PathBuf::from(CONFIG_FILE_NAME), Path::to_path_buf);
            init(&path, force).map(|_| ())
        }
    }
}

fn show(config: &Config, explicit: Option<&Path>) -> Result<()> {
    match explicit.map(Path::to_path_buf).or_else(Config::find_config_file) {
        Some(path) => println!("# Config file: {}\n", path.display()),
        None => println!("# No configuration file found. Using defaults.\n"),
    }
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Write defaults to `path`; refuses to overwrite unless `force`
pub fn init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(false);
    }

    let content = Config::default().to_toml()?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration file created: {}", path.display());
    Ok(true)
}
