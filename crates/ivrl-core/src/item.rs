//! Training items, scored groups, and the records derived from them

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;

/// Metric name the IV environment asks the model to predict
pub const IMPLIED_VOLATILITY_METRIC: &str = "implied volatility";

/// One unit of work for the training loop: a prompt plus what a correct
/// answer looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingItem {
    /// System and user messages, in order
    pub prompt: Vec<ChatMessage>,
    /// Expected answer string, e.g. "70.5"
    pub expected_answer: String,
    /// Unused second target; always `None` for this environment but kept as
    /// a column of the rollout table.
    pub placeholder: Option<String>,
    /// Name of the predicted quantity, used to build the answer pattern
    pub metric_name: String,
}

impl TrainingItem {
    pub fn new(prompt: Vec<ChatMessage>, expected_answer: impl Into<String>) -> Self {
        Self {
            prompt,
            expected_answer: expected_answer.into(),
            placeholder: None,
            metric_name: IMPLIED_VOLATILITY_METRIC.to_string(),
        }
    }

    /// Prompt messages followed by the model's completion
    pub fn with_completion(&self, completion: impl Into<String>) -> Vec<ChatMessage> {
        let mut messages = self.prompt.clone();
        messages.push(ChatMessage::assistant(completion));
        messages
    }
}

/// Tokens, loss masks, and rewards for one group of rollouts, consumed by
/// the external trainer. The three vectors are always the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredGroup {
    pub tokens: Vec<Vec<u32>>,
    /// `-100` marks positions excluded from the loss
    pub masks: Vec<Vec<i64>>,
    pub scores: Vec<f64>,
}

impl ScoredGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tokens: Vec<u32>, masks: Vec<i64>, score: f64) {
        self.tokens.push(tokens);
        self.masks.push(masks);
        self.scores.push(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// True when every score equals the first one (or the group is empty),
    /// i.e. the group carries no learning signal.
    pub fn is_uniform(&self) -> bool {
        match self.scores.first() {
            Some(first) => self.scores.iter().all(|s| s == first),
            None => true,
        }
    }
}

/// Outcome of scoring a single evaluation record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalOutcome {
    /// 1.0 when an answer could be extracted, else 0.0
    pub format_correct: f64,
    pub accuracy: f64,
    /// `1 + accuracy` when format is correct, else 0
    pub combined: f64,
}

impl EvalOutcome {
    pub fn failed() -> Self {
        Self {
            format_correct: 0.0,
            accuracy: 0.0,
            combined: 0.0,
        }
    }

    pub fn extracted(accuracy: f64) -> Self {
        Self {
            format_correct: 1.0,
            accuracy,
            combined: 1.0 + accuracy,
        }
    }

    pub fn is_format_correct(&self) -> bool {
        self.format_correct == 1.0
    }
}

/// One row of the rollout table shown next to the training metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutRow {
    pub text: String,
    pub score: f64,
    pub expected: String,
    pub placeholder: Option<String>,
    pub metric_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_item_defaults() {
        let item = TrainingItem::new(vec![ChatMessage::system("s")], "70.5");
        assert_eq!(item.metric_name, IMPLIED_VOLATILITY_METRIC);
        assert!(item.placeholder.is_none());
        assert_eq!(item.expected_answer, "70.5");
    }

    #[test]
    fn test_with_completion_appends_assistant() {
        let item = TrainingItem::new(
            vec![ChatMessage::system("s"), ChatMessage::user("u")],
            "1.0",
        );
        let messages = item.with_completion("answer");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], ChatMessage::assistant("answer"));
        assert_eq!(item.prompt.len(), 2);
    }

    #[test]
    fn test_scored_group_uniformity() {
        let mut group = ScoredGroup::new();
        assert!(group.is_uniform());

        group.push(vec![1], vec![1], 1.0);
        group.push(vec![2], vec![2], 1.0);
        assert!(group.is_uniform());

        group.push(vec![3], vec![3], -1.0);
        assert!(!group.is_uniform());
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn test_eval_outcome() {
        let ok = EvalOutcome::extracted(0.7);
        assert!(ok.is_format_correct());
        assert!((ok.combined - 1.7).abs() < 1e-12);

        let bad = EvalOutcome::failed();
        assert!(!bad.is_format_correct());
        assert_eq!(bad.combined, 0.0);
    }
}
