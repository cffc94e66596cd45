//! Training and evaluation metric aggregation
//!
//! Scores accumulate in running buffers between logging cycles. Each call to
//! [`MetricsTracker::flush`] turns them into a [`MetricsReport`] and resets
//! them, so every cycle reports only what happened since the previous one.

use std::collections::{BTreeMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use ivrl_core::util::preview;
use ivrl_core::{EvalOutcome, IvrlError, Result, RolloutRow, RunId, ScoredGroup, TrainingItem};

use crate::scoring::RolloutScore;
use crate::tokenizer::TokenCodec;

pub const TRAIN_FORMAT: &str = "train/avg_format_correctness";
pub const TRAIN_ACCURACY: &str = "train/avg_iv_accuracy";
pub const TRAIN_COMBINED: &str = "train/combined_score";
pub const EVAL_FORMAT: &str = "eval/avg_format_correctness";
pub const EVAL_ACCURACY: &str = "eval/avg_iv_accuracy";
pub const EVAL_COMBINED: &str = "eval/combined_score";

/// Mean of a slice, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Aggregate evaluation metrics over all test records. Accuracy is averaged
/// over format-correct records only; empty sets report 0.
pub fn summarize_eval(outcomes: &[EvalOutcome]) -> Vec<(String, f64)> {
    let format: Vec<f64> = outcomes.iter().map(|o| o.format_correct).collect();
    let accuracy: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.is_format_correct())
        .map(|o| o.accuracy)
        .collect();
    let combined: Vec<f64> = outcomes.iter().map(|o| o.combined).collect();

    vec![
        (EVAL_FORMAT.to_string(), mean(&format).unwrap_or(0.0)),
        (EVAL_ACCURACY.to_string(), mean(&accuracy).unwrap_or(0.0)),
        (EVAL_COMBINED.to_string(), mean(&combined).unwrap_or(0.0)),
    ]
}

/// Everything logged in one cycle
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub run_id: RunId,
    pub step: u64,
    pub timestamp: DateTime<Utc>,
    pub scalars: BTreeMap<String, f64>,
    /// `train/rollouts` table rows
    pub rollouts: Vec<RolloutRow>,
}

/// Running buffers for one training run
#[derive(Debug)]
pub struct MetricsTracker {
    run_id: RunId,
    format_buffer: Vec<f64>,
    accuracy_buffer: Vec<f64>,
    eval_metrics: Vec<(String, f64)>,
    rollout_groups: VecDeque<Vec<RolloutRow>>,
    rows_per_group: usize,
    groups_to_keep: usize,
}

impl MetricsTracker {
    pub fn new(run_id: RunId, rows_per_group: usize, groups_to_keep: usize) -> Self {
        Self {
            run_id,
            format_buffer: Vec::new(),
            accuracy_buffer: Vec::new(),
            eval_metrics: Vec::new(),
            rollout_groups: VecDeque::new(),
            rows_per_group,
            groups_to_keep,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Record the scores of rollouts kept in a group. Accuracy only counts
    /// when the answer could be extracted.
    pub fn record_rollouts(&mut self, scores: &[RolloutScore]) {
        for score in scores {
            if score.format_correct {
                self.format_buffer.push(1.0);
                self.accuracy_buffer.push(score.accuracy);
            } else {
                self.format_buffer.push(0.0);
            }
        }
    }

    /// Queue evaluation results for the next flush
    pub fn record_eval(&mut self, metrics: Vec<(String, f64)>) {
        self.eval_metrics.extend(metrics);
    }

    /// Keep decoded rows of a scored group for the rollout table. The
    /// oldest group is evicted once `groups_to_keep` is exceeded.
    pub fn record_group(
        &mut self,
        group: &ScoredGroup,
        item: &TrainingItem,
        codec: &dyn TokenCodec,
    ) -> Result<()> {
        let keep = self.rows_per_group.min(group.len());
        let mut rows = Vec::with_capacity(keep);
        for i in 0..keep {
            rows.push(RolloutRow {
                text: codec.decode(&group.tokens[i])?,
                score: group.scores[i],
                expected: item.expected_answer.clone(),
                placeholder: item.placeholder.clone(),
                metric_name: item.metric_name.clone(),
            });
        }

        self.rollout_groups.push_back(rows);
        while self.rollout_groups.len() > self.groups_to_keep {
            self.rollout_groups.pop_front();
        }
        Ok(())
    }

    /// Pending buffer sizes (format, accuracy)
    pub fn pending(&self) -> (usize, usize) {
        (self.format_buffer.len(), self.accuracy_buffer.len())
    }

    /// Compute this cycle's metrics and reset every buffer.
    ///
    /// Averages over empty buffers are omitted. The combined training score
    /// is the mean of format and accuracy when both exist, the format mean
    /// alone when only it exists, and 0 otherwise.
    pub fn flush(&mut self, step: u64) -> MetricsReport {
        let mut scalars = BTreeMap::new();

        let format = mean(&self.format_buffer);
        let accuracy = mean(&self.accuracy_buffer);
        if let Some(f) = format {
            scalars.insert(TRAIN_FORMAT.to_string(), f);
        }
        if let Some(a) = accuracy {
            scalars.insert(TRAIN_ACCURACY.to_string(), a);
        }
        let combined = match (format, accuracy) {
            (Some(f), Some(a)) => (f + a) / 2.0,
            (Some(f), None) => f,
            _ => 0.0,
        };
        scalars.insert(TRAIN_COMBINED.to_string(), combined);

        self.format_buffer.clear();
        self.accuracy_buffer.clear();

        for (name, value) in self.eval_metrics.drain(..) {
            scalars.insert(name, value);
        }

        let rollouts = self.rollout_groups.drain(..).flatten().collect();

        MetricsReport {
            run_id: self.run_id,
            step,
            timestamp: Utc::now(),
            scalars,
            rollouts,
        }
    }
}

/// Destination for metric reports
pub trait MetricsSink: Send + Sync {
    fn log(&self, report: &MetricsReport) -> Result<()>;
}

/// Logs scalars and a short preview of the rollout table through `tracing`
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn log(&self, report: &MetricsReport) -> Result<()> {
        for (name, value) in &report.scalars {
            info!(step = report.step, metric = %name, value = *value, "metric");
        }
        if let Some(row) = report.rollouts.first() {
            info!(
                step = report.step,
                rows = report.rollouts.len(),
                score = row.score,
                expected = %row.expected,
                "rollout sample: {}",
                preview(&row.text, 200)
            );
        }
        Ok(())
    }
}

/// Appends each report as one JSON line
pub struct JsonlMetricsSink {
    path: PathBuf,
}

impl JsonlMetricsSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MetricsSink for JsonlMetricsSink {
    fn log(&self, report: &MetricsReport) -> Result<()> {
        let mut line = serde_json::to_string(report)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                IvrlError::Sink(format!("Failed to open {}: {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
