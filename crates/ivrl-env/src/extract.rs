//! Answer extraction from model completions
//!
//! A completion is well-formed when it contains exactly one `<think>` and one
//! `</think>` tag, and the text after the closing tag contains exactly one
//! line of the form `The <metric> will be: <number>%`.

use std::sync::LazyLock;

use regex::Regex;

use ivrl_core::{IvrlError, Result};

static THINK_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<think>").unwrap());

static THINK_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</think>").unwrap());

/// Pulls the predicted value for one metric out of a completion
#[derive(Debug, Clone)]
pub struct AnswerExtractor {
    metric_name: String,
    answer: Regex,
}

impl AnswerExtractor {
    pub fn new(metric_name: &str) -> Result<Self> {
        let pattern = format!(
            r"(?i)The {} will be:\s*([-+]?\d+(?:\.\d+)?)%",
            regex::escape(metric_name)
        );
        let answer = Regex::new(&pattern)
            .map_err(|e| IvrlError::Internal(format!("Invalid answer pattern: {e}")))?;

        Ok(Self {
            metric_name: metric_name.to_string(),
            answer,
        })
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Numeric string of the prediction, or `None` when the completion does
    /// not follow the required format.
    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        if THINK_OPEN.find_iter(text).count() != 1 || THINK_CLOSE.find_iter(text).count() != 1 {
            return None;
        }

        let close = THINK_CLOSE.find(text)?;
        let thinking = &text[..close.start()];
        let answer_section = &text[close.end()..];

        if !thinking.to_lowercase().contains("<think>") {
            return None;
        }

        let mut matches = self.answer.captures_iter(answer_section);
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }

        first.get(1).map(|m| m.as_str())
    }
}
