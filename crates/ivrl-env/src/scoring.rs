//! Reward computation for IV predictions
//!
//! Training reward for one completion:
//! - extraction failure scores 0
//! - otherwise 1.0 plus an accuracy bonus from [`accuracy_score`]
//! - completions longer than 95% of the token budget lose
//!   `0.5 * tokens / max_tokens`
//! - the result is binarized to +1 / -1

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use ivrl_core::{ChatMessage, EvalOutcome, Result, ScoredGroup};

use crate::extract::AnswerExtractor;
use crate::tokenizer::{tokenize_for_trainer, ChatTemplate, TokenCodec};

/// Fraction of the token budget above which the length penalty applies
pub const LENGTH_PENALTY_THRESHOLD: f64 = 0.95;

/// Accuracy bonus for a prediction, by absolute percentage-point error.
/// Unparseable input scores 0.
pub fn accuracy_score(predicted: &str, expected: &str) -> f64 {
    let (Ok(pred), Ok(exp)) = (predicted.trim().parse::<f64>(), expected.trim().parse::<f64>())
    else {
        return 0.0;
    };

    let diff = (pred - exp).abs();
    if diff == 0.0 {
        1.0
    } else if diff <= 1.0 {
        0.9
    } else if diff <= 2.5 {
        0.7
    } else if diff <= 5.0 {
        0.5
    } else if diff <= 10.0 {
        0.3
    } else {
        0.0
    }
}

/// Penalty subtracted from the score of an overly long completion
pub fn length_penalty(token_count: usize, max_token_length: usize) -> f64 {
    let max = max_token_length as f64;
    if token_count as f64 > max * LENGTH_PENALTY_THRESHOLD {
        0.5 * (token_count as f64 / max)
    } else {
        0.0
    }
}

/// +1 for any positive score, -1 otherwise
pub fn binary_reward(score: f64) -> f64 {
    if score > 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Score breakdown for one training completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloutScore {
    pub format_correct: bool,
    /// Accuracy bonus; 0 when the format was wrong
    pub accuracy: f64,
    /// Score after the length penalty, before binarization
    pub adjusted: f64,
    pub reward: f64,
}

/// Score one completion against the expected answer
pub fn score_completion(
    extractor: &AnswerExtractor,
    completion: &str,
    expected: &str,
    token_count: usize,
    max_token_length: usize,
) -> RolloutScore {
    let (format_correct, accuracy, base) = match extractor.extract(completion) {
        Some(predicted) => {
            let accuracy = accuracy_score(predicted, expected);
            (true, accuracy, 1.0 + accuracy)
        }
        None => (false, 0.0, 0.0),
    };

    let adjusted = base - length_penalty(token_count, max_token_length);

    RolloutScore {
        format_correct,
        accuracy,
        adjusted,
        reward: binary_reward(adjusted),
    }
}

/// Score one evaluation completion. No length penalty, no binarization.
pub fn score_eval(extractor: &AnswerExtractor, completion: &str, expected: &str) -> EvalOutcome {
    match extractor.extract(completion) {
        Some(predicted) => EvalOutcome::extracted(accuracy_score(predicted, expected)),
        None => EvalOutcome::failed(),
    }
}

/// Result of scoring a group of rollouts
#[derive(Debug, Clone, Default)]
pub struct GroupOutcome {
    /// `None` when the group carries no learning signal
    pub group: Option<ScoredGroup>,
    /// Scores of the rollouts that made it into the group
    pub kept: Vec<RolloutScore>,
}

/// Turns sampled conversations into a [`ScoredGroup`]
pub struct GroupScorer<'a> {
    pub extractor: &'a AnswerExtractor,
    pub codec: &'a dyn TokenCodec,
    pub template: ChatTemplate,
    pub group_size: usize,
    pub max_token_length: usize,
    /// Rollouts with fewer loss-bearing tokens are dropped
    pub min_unmasked_tokens: usize,
}

impl GroupScorer<'_> {
    /// Score conversations whose last message is the model's completion.
    ///
    /// Rollouts are shuffled first so truncation to `group_size` does not
    /// favor the order the server returned them in.
    pub fn score<R: Rng + ?Sized>(
        &self,
        mut rollouts: Vec<Vec<ChatMessage>>,
        expected: &str,
        rng: &mut R,
    ) -> Result<GroupOutcome> {
        rollouts.shuffle(rng);

        let mut group = ScoredGroup::new();
        let mut kept = Vec::new();

        for conversation in &rollouts {
            let Some(completion) = conversation.last() else {
                continue;
            };

            let token_count = self.codec.count(&completion.content)?;
            let score = score_completion(
                self.extractor,
                &completion.content,
                expected,
                token_count,
                self.max_token_length,
            );

            let encoded = tokenize_for_trainer(self.codec, self.template, conversation)?;
            if encoded.unmasked() < self.min_unmasked_tokens {
                debug!(
                    "Dropping rollout with {} unmasked tokens",
                    encoded.unmasked()
                );
                continue;
            }

            group.push(encoded.tokens, encoded.masks, score.reward);
            kept.push(score);

            if group.len() >= self.group_size {
                break;
            }
        }

        let group = if group.is_uniform() { None } else { Some(group) };
        Ok(GroupOutcome { group, kept })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::test_support::CharCodec;
    use ivrl_core::item::IMPLIED_VOLATILITY_METRIC;
    use ivrl_core::TrainingItem;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn extractor() -> AnswerExtractor {
        AnswerExtractor::new(IMPLIED_VOLATILITY_METRIC).unwrap()
    }

    fn answer(value: &str) -> String {
        format!("<think>reasoning</think>\nThe implied volatility will be: {value}%")
    }

    #[test]
    fn test_accuracy_steps() {
        assert_eq!(accuracy_score("50.0", "50.0"), 1.0);
        assert_eq!(accuracy_score("51.0", "50.0"), 0.9);
        assert_eq!(accuracy_score("52.5", "50.0"), 0.7);
        assert_eq!(accuracy_score("55.0", "50.0"), 0.5);
        assert_eq!(accuracy_score("60.0", "50.0"), 0.3);
        assert_eq!(accuracy_score("60.1", "50.0"), 0.0);
        assert_eq!(accuracy_score("39.0", "50.0"), 0.0);
    }

    #[test]
    fn test_accuracy_non_increasing() {
        let mut last = f64::INFINITY;
        for i in 0..=400 {
            let pred = format!("{}", 50.0 + f64::from(i) * 0.05);
            let score = accuracy_score(&pred, "50.0");
            assert!(score <= last, "score rose at error {}", f64::from(i) * 0.05);
            last = score;
        }
    }

    #[test]
    fn test_accuracy_unparseable() {
        assert_eq!(accuracy_score("abc", "50.0"), 0.0);
        assert_eq!(accuracy_score("50.0", ""), 0.0);
    }

    #[test]
    fn test_length_penalty() {
        assert_eq!(length_penalty(950, 1000), 0.0);
        assert!((length_penalty(951, 1000) - 0.4755).abs() < 1e-12);
        assert!((length_penalty(1000, 1000) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_close_prediction_rewarded() {
        let score = score_completion(&extractor(), &answer("70.0"), "70.5", 20, 1000);
        assert!(score.format_correct);
        assert_eq!(score.accuracy, 0.9);
        assert!((score.adjusted - 1.9).abs() < 1e-12);
        assert_eq!(score.reward, 1.0);
    }

    #[test]
    fn test_missing_tags_punished() {
        let score = score_completion(
            &extractor(),
            "The implied volatility will be: 70.5%",
            "70.5",
            10,
            1000,
        );
        assert!(!score.format_correct);
        assert_eq!(score.adjusted, 0.0);
        assert_eq!(score.reward, -1.0);
    }

    #[test]
    fn test_penalty_can_flip_wrong_answer_further() {
        let score = score_completion(&extractor(), "no format", "70.5", 1000, 1000);
        assert!((score.adjusted + 0.5).abs() < 1e-12);
        assert_eq!(score.reward, -1.0);

        // A correct but maximal-length answer still stays positive
        let score = score_completion(&extractor(), &answer("70.5"), "70.5", 1000, 1000);
        assert!((score.adjusted - 1.5).abs() < 1e-12);
        assert_eq!(score.reward, 1.0);
    }

    #[test]
    fn test_score_eval() {
        let ok = score_eval(&extractor(), &answer("75.0"), "70.5");
        assert_eq!(ok.format_correct, 1.0);
        assert_eq!(ok.accuracy, 0.5);
        assert!((ok.combined - 1.5).abs() < 1e-12);

        let bad = score_eval(&extractor(), "nothing", "70.5");
        assert_eq!(bad, EvalOutcome::failed());
    }

    fn scorer<'a>(extractor: &'a AnswerExtractor, group_size: usize) -> GroupScorer<'a> {
        GroupScorer {
            extractor,
            codec: &CharCodec,
            template: ChatTemplate::ChatMl,
            group_size,
            max_token_length: 10_000,
            min_unmasked_tokens: 10,
        }
    }

    fn item() -> TrainingItem {
        TrainingItem::new(
            vec![ChatMessage::system("sys"), ChatMessage::user("predict")],
            "70.5",
        )
    }

    #[test]
    fn test_group_mixed_rewards_kept() {
        let ex = extractor();
        let item = item();
        let rollouts = vec![
            item.with_completion(answer("70.0")),
            item.with_completion("I refuse to follow the format."),
        ];
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = scorer(&ex, 16).score(rollouts, "70.5", &mut rng).unwrap();
        let group = outcome.group.expect("mixed rewards keep the group");

        assert_eq!(group.len(), 2);
        let mut scores = group.scores.clone();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(scores, vec![-1.0, 1.0]);
        assert_eq!(outcome.kept.len(), 2);
    }

    #[test]
    fn test_group_uniform_rewards_discarded() {
        let ex = extractor();
        let item = item();
        let rollouts = vec![
            item.with_completion(answer("70.0")),
            item.with_completion(answer("90.0")),
        ];
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = scorer(&ex, 16).score(rollouts, "70.5", &mut rng).unwrap();
        assert!(outcome.group.is_none());
        assert_eq!(outcome.kept.len(), 2);
    }

    #[test]
    fn test_group_drops_short_rollouts() {
        let ex = extractor();
        let item = item();
        // An empty completion leaves only the 11-char end marker unmasked
        let rollouts = vec![item.with_completion(""), item.with_completion(answer("70.5"))];
        let mut rng = StdRng::seed_from_u64(3);

        let mut s = scorer(&ex, 16);
        s.min_unmasked_tokens = 12;
        let outcome = s.score(rollouts, "70.5", &mut rng).unwrap();

        assert_eq!(outcome.kept.len(), 1);
        assert!(outcome.group.is_none());
    }

    #[test]
    fn test_group_truncated_to_group_size() {
        let ex = extractor();
        let item = item();
        let rollouts = (0..6)
            .map(|i| {
                if i % 2 == 0 {
                    item.with_completion(answer("70.5"))
                } else {
                    item.with_completion("bad format, no answer here")
                }
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(9);

        let outcome = scorer(&ex, 4).score(rollouts, "70.5", &mut rng).unwrap();
        assert_eq!(outcome.kept.len(), 4);
        if let Some(group) = outcome.group {
            assert_eq!(group.len(), 4);
        }
    }
}
