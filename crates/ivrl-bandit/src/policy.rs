//! Categorical policy over learnable logits

use anyhow::{anyhow, Result};
use ndarray::Array1;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Softmax policy `π = softmax(logits)`
#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxPolicy {
    logits: Array1<f64>,
}

impl SoftmaxPolicy {
    /// Uniform policy over `actions` actions (all logits zero)
    pub fn new(actions: usize) -> Self {
        Self {
            logits: Array1::zeros(actions),
        }
    }

    pub fn from_logits(logits: Vec<f64>) -> Self {
        Self {
            logits: Array1::from(logits),
        }
    }

    pub fn action_count(&self) -> usize {
        self.logits.len()
    }

    pub fn logits(&self) -> &Array1<f64> {
        &self.logits
    }

    pub fn logits_mut(&mut self) -> &mut Array1<f64> {
        &mut self.logits
    }

    /// Action probabilities. Shifted by the max logit for stability.
    pub fn probabilities(&self) -> Array1<f64> {
        let max = self.logits.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let exp = self.logits.mapv(|l| (l - max).exp());
        let sum = exp.sum();
        exp / sum
    }

    pub fn log_prob(&self, action: usize) -> f64 {
        self.probabilities()[action].ln()
    }

    /// Draw an action from π
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize> {
        let probs = self.probabilities();
        let dist = WeightedIndex::new(probs.iter())
            .map_err(|e| anyhow!("Invalid action distribution: {}", e))?;
        Ok(dist.sample(rng))
    }

    /// Gradient of `-log π(action) * reward` with respect to the logits
    pub fn loss_gradient(&self, action: usize, reward: f64) -> Array1<f64> {
        let mut grad = self.probabilities();
        grad[action] -= 1.0;
        grad * reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_start() {
        let policy = SoftmaxPolicy::new(2);
        let probs = policy.probabilities();
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!((probs[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let policy = SoftmaxPolicy::from_logits(vec![800.0, -3.0, 2.5]);
        let probs = policy.probabilities();
        assert!((probs.sum() - 1.0).abs() < 1e-12);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_gradient() {
        let policy = SoftmaxPolicy::new(2);
        let grad = policy.loss_gradient(1, 1.0);
        assert!((grad[0] - 0.5).abs() < 1e-12);
        assert!((grad[1] + 0.5).abs() < 1e-12);

        // No reward, no gradient
        let grad = policy.loss_gradient(0, 0.0);
        assert!(grad.iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_sample_respects_probabilities() {
        let policy = SoftmaxPolicy::from_logits(vec![-50.0, 50.0]);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(policy.sample(&mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_log_prob() {
        let policy = SoftmaxPolicy::new(2);
        assert!((policy.log_prob(0) - 0.5f64.ln()).abs() < 1e-12);
    }
}
