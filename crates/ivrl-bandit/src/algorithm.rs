//! Policy learning algorithm trait and implementations

use anyhow::{anyhow, Result};
use rand::RngCore;

use crate::optimizer::Optimizer;
use crate::policy::SoftmaxPolicy;

/// Trait for policy learning algorithms
pub trait PolicyAlgorithm: Send + Sync {
    /// Algorithm name
    fn name(&self) -> &str;

    /// Sample an action from the current policy
    fn select_action(&self, rng: &mut dyn RngCore) -> Result<usize>;

    /// Learn from the reward of `action`; returns the loss before the update
    fn update(&mut self, action: usize, reward: f64) -> Result<f64>;

    /// Current action probabilities
    fn probabilities(&self) -> Vec<f64>;

    /// Get algorithm parameters as JSON
    fn get_params(&self) -> serde_json::Value;

    /// Set algorithm parameters from JSON
    fn set_params(&mut self, params: serde_json::Value) -> Result<()>;
}

/// REINFORCE on a single-state bandit: minimizes `-log π(a) * r`
pub struct Reinforce {
    policy: SoftmaxPolicy,
    optimizer: Box<dyn Optimizer>,
}

impl Reinforce {
    pub fn new(actions: usize, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            policy: SoftmaxPolicy::new(actions),
            optimizer,
        }
    }

    pub fn policy(&self) -> &SoftmaxPolicy {
        &self.policy
    }
}

impl PolicyAlgorithm for Reinforce {
    fn name(&self) -> &str {
        "reinforce"
    }

    fn select_action(&self, rng: &mut dyn RngCore) -> Result<usize> {
        self.policy.sample(rng)
    }

    fn update(&mut self, action: usize, reward: f64) -> Result<f64> {
        if action >= self.policy.action_count() {
            return Err(anyhow!(
                "Action {} out of range for {} actions",
                action,
                self.policy.action_count()
            ));
        }

        let loss = -self.policy.log_prob(action) * reward;
        let grad = self.policy.loss_gradient(action, reward);
        self.optimizer.step(self.policy.logits_mut(), &grad);
        Ok(loss)
    }

    fn probabilities(&self) -> Vec<f64> {
        self.policy.probabilities().to_vec()
    }

    fn get_params(&self) -> serde_json::Value {
        serde_json::json!({
            "logits": self.policy.logits().to_vec(),
            "optimizer": self.optimizer.get_params(),
        })
    }

    fn set_params(&mut self, params: serde_json::Value) -> Result<()> {
        if let Some(logits) = params.get("logits").and_then(|v| v.as_array()) {
            let logits: Vec<f64> = logits.iter().filter_map(serde_json::Value::as_f64).collect();
            if logits.len() != self.policy.action_count() {
                return Err(anyhow!(
                    "Expected {} logits, got {}",
                    self.policy.action_count(),
                    logits.len()
                ));
            }
            self.policy = SoftmaxPolicy::from_logits(logits);
        }
        Ok(())
    }
}
