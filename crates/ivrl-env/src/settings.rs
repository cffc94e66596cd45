//! Environment and inference settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ivrl_core::{IvrlError, Result};

use crate::tokenizer::ChatTemplate;

/// Settings for the IV-prediction environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Options CSV
    pub data_path: PathBuf,
    /// HuggingFace `tokenizer.json`
    pub tokenizer_path: PathBuf,
    pub chat_template: ChatTemplate,
    /// Completions sampled and scored together per item
    pub group_size: usize,
    pub max_token_length: usize,
    pub total_steps: u64,
    pub steps_per_eval: u64,
    pub test_fraction: f64,
    pub seed: u64,
    pub train_max_tokens: usize,
    pub train_temperature: f64,
    pub eval_max_tokens: usize,
    pub eval_temperature: f64,
    pub min_unmasked_tokens: usize,
    /// Rollout groups retained for the rollout table
    pub num_rollouts_to_keep: usize,
    /// Rows kept per group; `None` keeps a full group
    pub num_rollouts_per_group_for_logging: Option<usize>,
    /// Trainer API that receives scored groups; empty disables it
    pub rollout_server_url: Option<String>,
    /// JSONL file that receives scored groups
    pub data_path_to_save_groups: Option<PathBuf>,
    /// JSONL file that receives each metrics cycle
    pub metrics_path: Option<PathBuf>,
    pub checkpoint_dir: PathBuf,
    pub checkpoint_interval: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("unh_options.csv"),
            tokenizer_path: PathBuf::from("tokenizer.json"),
            chat_template: ChatTemplate::Llama3,
            group_size: 16,
            max_token_length: 1024 * 16,
            total_steps: 2000,
            steps_per_eval: 20,
            test_fraction: 0.05,
            seed: 42,
            train_max_tokens: 1024 * 15,
            train_temperature: 0.8,
            eval_max_tokens: 1024 * 16,
            eval_temperature: 0.2,
            min_unmasked_tokens: 10,
            num_rollouts_to_keep: 10,
            num_rollouts_per_group_for_logging: None,
            rollout_server_url: Some("http://localhost:8000".to_string()),
            data_path_to_save_groups: None,
            metrics_path: None,
            checkpoint_dir: PathBuf::from("checkpoints"),
            checkpoint_interval: 100,
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<()> {
        if self.group_size == 0 {
            return Err(IvrlError::Config("env.group_size must be positive".into()));
        }
        if self.max_token_length == 0 {
            return Err(IvrlError::Config(
                "env.max_token_length must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(IvrlError::Config(format!(
                "env.test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.num_rollouts_per_group_for_logging == Some(0) {
            return Err(IvrlError::Config(
                "env.num_rollouts_per_group_for_logging must be positive when set".into(),
            ));
        }
        Ok(())
    }

    /// Trainer URL, if one is configured
    pub fn rollout_server(&self) -> Option<&str> {
        self.rollout_server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Rollout table rows kept per group
    pub fn rollouts_per_group_for_logging(&self) -> usize {
        self.num_rollouts_per_group_for_logging
            .unwrap_or(self.group_size)
    }
}

/// Settings for the OpenAI-compatible inference server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:9004/v1`
    pub base_url: String,
    pub model_name: String,
    pub api_key: String,
    /// Concurrent eval requests in flight
    pub num_requests_for_eval: usize,
    pub timeout_seconds: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9004/v1".to_string(),
            model_name: "NousResearch/DeepHermes-3-Llama-3-8B-Preview".to_string(),
            api_key: "x".to_string(),
            num_requests_for_eval: 256,
            timeout_seconds: 600,
        }
    }
}
