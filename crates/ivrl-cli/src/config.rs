//! Configuration loading for the ivrl CLI

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use ivrl_bandit::BanditConfig;
use ivrl_env::{EnvConfig, InferenceConfig};

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "ivrl.toml";

/// Configuration for every ivrl command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: EnvConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
    pub bandit: BanditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Also write logs here when non-empty
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: String::new(),
        }
    }
}

impl Config {
    /// Config file to read: an explicit path must exist, otherwise the first
    /// file found by [`Config::find_config_file`], if any.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        match explicit {
            Some(path) if !path.exists() => bail!("Config file not found: {}", path.display()),
            Some(path) => Ok(Some(path.to_path_buf())),
            None => Ok(Self::find_config_file()),
        }
    }

    /// Build configuration from `path` (or defaults) plus the environment.
    ///
    /// `IVRL__SECTION__KEY` environment variables override file values.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("IVRL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Find config file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: IVRL_CONFIG env, ./ivrl.toml, ~/.config/ivrl/ivrl.toml
        if let Ok(path) = std::env::var("IVRL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("ivrl").join(CONFIG_FILE_NAME);
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}
