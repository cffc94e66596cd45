//! Episode history for the bandit trainer

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One pull of the bandit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub index: usize,
    pub action: usize,
    pub reward: f64,
    pub loss: f64,
    /// Policy probabilities the action was sampled from
    pub probabilities: Vec<f64>,
}

/// Bounded episode history; oldest episodes are evicted first
pub struct EpisodeHistory {
    buffer: VecDeque<Episode>,
    capacity: usize,
}

impl EpisodeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, episode: Episode) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(episode);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Episode> {
        self.buffer.iter()
    }

    pub fn last(&self) -> Option<&Episode> {
        self.buffer.back()
    }

    /// Mean reward over the retained episodes
    pub fn average_reward(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.buffer.iter().map(|e| e.reward).sum::<f64>() / self.buffer.len() as f64
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(index: usize, reward: f64) -> Episode {
        Episode {
            index,
            action: usize::from(reward > 0.0),
            reward,
            loss: 0.0,
            probabilities: vec![0.5, 0.5],
        }
    }

    #[test]
    fn test_history_bounded() {
        let mut history = EpisodeHistory::new(3);
        for i in 0..5 {
            history.push(episode(i, 1.0));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().next().unwrap().index, 2);
        assert_eq!(history.last().unwrap().index, 4);
    }

    #[test]
    fn test_average_reward() {
        let mut history = EpisodeHistory::new(10);
        assert_eq!(history.average_reward(), 0.0);

        history.push(episode(0, 1.0));
        history.push(episode(1, 0.0));
        assert!((history.average_reward() - 0.5).abs() < 1e-12);

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = EpisodeHistory::new(0);
        history.push(episode(0, 1.0));
        assert!(history.is_empty());
    }
}
