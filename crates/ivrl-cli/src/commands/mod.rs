//! CLI command implementations

pub mod bandit;
pub mod config;
pub mod evaluate;
pub mod run;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use ivrl_env::tokenizer::load_tokenizer;
use ivrl_env::{IvEnvironment, OpenAiCompletionClient};

use crate::config::Config;

/// Tokenizer, inference client, and environment from configuration
pub fn build_environment(config: &Config) -> Result<IvEnvironment> {
    let tokenizer = load_tokenizer(&config.env.tokenizer_path).with_context(|| {
        format!("Failed to load tokenizer from {}", config.env.tokenizer_path.display())
    })?;
    let backend = OpenAiCompletionClient::new(&config.inference)?;
    info!(
        "Using model {} at {}",
        config.inference.model_name, config.inference.base_url
    );

    let env = IvEnvironment::setup(config.env.clone(), Arc::new(backend), Arc::new(tokenizer))
        .with_context(|| format!("Failed to set up environment from {}", config.env.data_path.display()))?;
    Ok(env)
}
