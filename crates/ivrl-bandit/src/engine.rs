//! Bandit trainer - Runs the sample / reward / update loop

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithm::{PolicyAlgorithm, Reinforce};
use crate::experience::{Episode, EpisodeHistory};
use crate::optimizer::OptimizerKind;

/// Number of arms
pub const ACTIONS: usize = 2;

/// Reward table: action 1 pays 1, everything else pays 0
pub fn reward_for(action: usize) -> f64 {
    if action == 1 {
        1.0
    } else {
        0.0
    }
}

/// Bandit demo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditConfig {
    pub episodes: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub optimizer: OptimizerKind,
    /// Progress is logged every `log_interval` episodes and at the last one
    pub log_interval: usize,
    pub history_capacity: usize,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            learning_rate: 0.1,
            seed: 42,
            optimizer: OptimizerKind::Adam,
            log_interval: 10,
            history_capacity: 1000,
        }
    }
}

impl BanditConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(anyhow!(
                "bandit.learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }
}

/// Bandit trainer statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanditStats {
    pub algorithm: String,
    pub optimizer: OptimizerKind,
    pub episodes: usize,
    pub total_reward: f64,
    pub average_reward: f64,
    pub action_counts: Vec<u64>,
    pub final_probabilities: Vec<f64>,
}

/// Drives one policy through the bandit
pub struct BanditTrainer {
    algorithm: Box<dyn PolicyAlgorithm>,
    config: BanditConfig,
    history: EpisodeHistory,
    rng: StdRng,
    episodes_run: usize,
    total_reward: f64,
    action_counts: Vec<u64>,
}

impl BanditTrainer {
    pub fn new(config: BanditConfig) -> Result<Self> {
        config.validate()?;
        let algorithm = Box::new(Reinforce::new(
            ACTIONS,
            config.optimizer.build(config.learning_rate),
        ));
        Ok(Self::with_algorithm(config, algorithm))
    }

    pub fn with_algorithm(config: BanditConfig, algorithm: Box<dyn PolicyAlgorithm>) -> Self {
        Self {
            algorithm,
            history: EpisodeHistory::new(config.history_capacity),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            episodes_run: 0,
            total_reward: 0.0,
            action_counts: vec![0; ACTIONS],
        }
    }

    pub fn history(&self) -> &EpisodeHistory {
        &self.history
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.algorithm.probabilities()
    }

    /// Sample, reward, and update once
    pub fn step(&mut self) -> Result<Episode> {
        let probabilities = self.algorithm.probabilities();
        let action = self.algorithm.select_action(&mut self.rng)?;
        let reward = reward_for(action);
        let loss = self.algorithm.update(action, reward)?;

        let episode = Episode {
            index: self.episodes_run,
            action,
            reward,
            loss,
            probabilities,
        };

        self.episodes_run += 1;
        self.total_reward += reward;
        if let Some(count) = self.action_counts.get_mut(action) {
            *count += 1;
        }
        self.history.push(episode.clone());
        Ok(episode)
    }

    /// Run the configured number of episodes
    pub fn run(&mut self) -> Result<BanditStats> {
        let episodes = self.config.episodes;
        info!(
            "Training {} with {} (lr={}) for {} episodes, seed {}",
            self.algorithm.name(),
            self.config.optimizer,
            self.config.learning_rate,
            episodes,
            self.config.seed
        );

        for i in 0..episodes {
            let episode = self.step()?;
            let interval = self.config.log_interval.max(1);
            if i % interval == 0 || i + 1 == episodes {
                info!(
                    "Episode {:3}: action={}, reward={}, probs={:?}",
                    episode.index, episode.action, episode.reward, episode.probabilities
                );
            } else {
                debug!("Episode {}: loss={:.4}", episode.index, episode.loss);
            }
        }

        Ok(self.stats())
    }

    pub fn stats(&self) -> BanditStats {
        BanditStats {
            algorithm: self.algorithm.name().to_string(),
            optimizer: self.config.optimizer,
            episodes: self.episodes_run,
            total_reward: self.total_reward,
            average_reward: if self.episodes_run > 0 {
                self.total_reward / self.episodes_run as f64
            } else {
                0.0
            },
            action_counts: self.action_counts.clone(),
            final_probabilities: self.algorithm.probabilities(),
        }
    }
}
