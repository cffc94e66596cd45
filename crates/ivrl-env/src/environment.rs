//! IV environment - Coordinates sampling, scoring, evaluation, and logging

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use ivrl_core::item::IMPLIED_VOLATILITY_METRIC;
use ivrl_core::{EvalOutcome, MarketRecord, Result, RunId, ScoredGroup, Split, TrainingItem};

use crate::checkpoint::Checkpoint;
use crate::counters;
use crate::dataset::Dataset;
use crate::extract::AnswerExtractor;
use crate::inference::{CompletionBackend, CompletionRequest};
use crate::metrics::{
    summarize_eval, JsonlMetricsSink, MetricsSink, MetricsTracker, TracingMetricsSink,
};
use crate::prompt::build_item;
use crate::scoring::{score_eval, GroupOutcome, GroupScorer};
use crate::settings::EnvConfig;
use crate::sink::{GroupSink, HttpGroupSink, JsonlGroupSink};
use crate::tokenizer::TokenCodec;

/// Totals for one call to [`IvEnvironment::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub first_step: u64,
    pub last_step: u64,
    pub groups_sent: u64,
    pub groups_discarded: u64,
    pub steps_skipped: u64,
    pub evaluations: u64,
}

/// Implied-volatility prediction environment
pub struct IvEnvironment {
    config: EnvConfig,
    dataset: Dataset,
    backend: Arc<dyn CompletionBackend>,
    codec: Arc<dyn TokenCodec>,
    extractor: AnswerExtractor,
    group_sinks: Vec<Box<dyn GroupSink>>,
    metrics_sinks: Vec<Box<dyn MetricsSink>>,
    metrics: MetricsTracker,
    rng: StdRng,
    iter: u64,
    /// `iter` as of the last completed step
    completed_iter: u64,
    step: u64,
}

impl IvEnvironment {
    /// Load the dataset named in `config`, attach the configured sinks, and
    /// resume from a checkpoint when one exists.
    pub fn setup(
        config: EnvConfig,
        backend: Arc<dyn CompletionBackend>,
        codec: Arc<dyn TokenCodec>,
    ) -> Result<Self> {
        config.validate()?;
        let dataset = Dataset::load_csv(&config.data_path, config.test_fraction, config.seed)?;
        if let Some(first) = dataset.train().first() {
            info!("First training record: {:?}", first);
        }

        let mut env = Self::with_dataset(config, dataset, backend, codec)?;
        env.attach_configured_sinks()?;
        env.resume()?;
        Ok(env)
    }

    /// Build an environment over an already loaded dataset, without sinks
    pub fn with_dataset(
        config: EnvConfig,
        dataset: Dataset,
        backend: Arc<dyn CompletionBackend>,
        codec: Arc<dyn TokenCodec>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = MetricsTracker::new(
            RunId::new(),
            config.rollouts_per_group_for_logging(),
            config.num_rollouts_to_keep,
        );
        let rng = StdRng::seed_from_u64(config.seed);

        Ok(Self {
            extractor: AnswerExtractor::new(IMPLIED_VOLATILITY_METRIC)?,
            config,
            dataset,
            backend,
            codec,
            group_sinks: Vec::new(),
            metrics_sinks: Vec::new(),
            metrics,
            rng,
            iter: 0,
            completed_iter: 0,
            step: 0,
        })
    }

    fn attach_configured_sinks(&mut self) -> Result<()> {
        if let Some(url) = self.config.rollout_server() {
            let sink = HttpGroupSink::new(url)?;
            info!("Sending scored groups to {}", sink.url());
            self.group_sinks.push(Box::new(sink));
        }
        if let Some(path) = self.config.data_path_to_save_groups.clone() {
            info!("Saving scored groups to {}", path.display());
            self.group_sinks.push(Box::new(JsonlGroupSink::new(path)));
        }

        self.metrics_sinks.push(Box::new(TracingMetricsSink));
        if let Some(path) = self.config.metrics_path.clone() {
            info!("Writing metrics to {}", path.display());
            self.metrics_sinks.push(Box::new(JsonlMetricsSink::new(path)));
        }
        Ok(())
    }

    /// Restore `step` and `iter` from `checkpoint_dir`
    pub fn resume(&mut self) -> Result<bool> {
        match Checkpoint::load(&self.config.checkpoint_dir)? {
            Some(checkpoint) => {
                info!(
                    "Resuming from checkpoint: step={}, iter={}",
                    checkpoint.step, checkpoint.iter
                );
                self.step = checkpoint.step;
                self.iter = checkpoint.iter;
                self.completed_iter = checkpoint.iter;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn add_group_sink(&mut self, sink: Box<dyn GroupSink>) {
        self.group_sinks.push(sink);
    }

    pub fn add_metrics_sink(&mut self, sink: Box<dyn MetricsSink>) {
        self.metrics_sinks.push(sink);
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn run_id(&self) -> RunId {
        self.metrics.run_id()
    }

    pub fn iter(&self) -> u64 {
        self.iter
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Next training item, cycling through the train split
    pub fn next_item(&mut self) -> TrainingItem {
        let record = self.dataset.train_record(self.iter);
        self.iter += 1;
        build_item(record, Utc::now())
    }

    /// Sample `group_size` completions for `item` and score them as a group
    pub async fn collect_trajectories(&mut self, item: &TrainingItem) -> Result<GroupOutcome> {
        let request = CompletionRequest {
            prompt: self.config.chat_template.render(&item.prompt, true),
            n: self.config.group_size,
            max_tokens: self.config.train_max_tokens,
            temperature: self.config.train_temperature,
            split: Split::Train,
        };
        let completions = self.backend.complete(request).await?;
        debug!("Received {} completions", completions.len());

        let rollouts = completions
            .into_iter()
            .map(|c| item.with_completion(c))
            .collect();

        let scorer = GroupScorer {
            extractor: &self.extractor,
            codec: self.codec.as_ref(),
            template: self.config.chat_template,
            group_size: self.config.group_size,
            max_token_length: self.config.max_token_length,
            min_unmasked_tokens: self.config.min_unmasked_tokens,
        };
        let outcome = scorer.score(rollouts, &item.expected_answer, &mut self.rng)?;

        let failures = outcome.kept.iter().filter(|s| !s.format_correct).count();
        counters::ROLLOUTS_SCORED_TOTAL.inc_by(outcome.kept.len() as u64);
        counters::EXTRACTION_FAILURES_TOTAL.inc_by(failures as u64);
        if outcome.group.is_none() {
            counters::GROUPS_DISCARDED_TOTAL.inc();
        }

        self.metrics.record_rollouts(&outcome.kept);
        Ok(outcome)
    }

    /// Sample and score one completion for a test record. A failed request
    /// counts as a format failure.
    pub async fn rollout_and_score_eval(&self, record: &MarketRecord) -> EvalOutcome {
        let item = build_item(record, Utc::now());
        let request = CompletionRequest {
            prompt: self.config.chat_template.render(&item.prompt, true),
            n: 1,
            max_tokens: self.config.eval_max_tokens,
            temperature: self.config.eval_temperature,
            split: Split::Eval,
        };

        match self.backend.complete(request).await {
            Ok(completions) => match completions.first() {
                Some(completion) => score_eval(&self.extractor, completion, &item.expected_answer),
                None => EvalOutcome::failed(),
            },
            Err(e) => {
                warn!("Eval request failed: {}", e);
                EvalOutcome::failed()
            }
        }
    }

    /// Score every test record concurrently and queue the eval metrics for
    /// the next flush.
    pub async fn evaluate(&mut self) -> Vec<(String, f64)> {
        let outcomes = join_all(
            self.dataset
                .test()
                .iter()
                .map(|record| self.rollout_and_score_eval(record)),
        )
        .await;

        let summary = summarize_eval(&outcomes);
        info!(
            "Evaluated {} test records: {}",
            outcomes.len(),
            summary
                .iter()
                .map(|(k, v)| format!("{k}={v:.4}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.metrics.record_eval(summary.clone());
        summary
    }

    /// Hand a group to every sink; failures are logged and counted
    pub async fn send_group(&self, group: &ScoredGroup) -> usize {
        counters::GROUPS_SENT_TOTAL.inc();

        let mut delivered = 0;
        for sink in &self.group_sinks {
            match sink.send(group).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    counters::SINK_ERRORS_TOTAL.inc();
                    error!("Failed to deliver group to {} sink: {}", sink.name(), e);
                }
            }
        }
        delivered
    }

    /// Keep decoded rows of `group` for the rollout table
    pub fn add_rollouts_for_logging(
        &mut self,
        group: &ScoredGroup,
        item: &TrainingItem,
    ) -> Result<()> {
        self.metrics.record_group(group, item, self.codec.as_ref())
    }

    /// Flush buffered metrics to every metrics sink
    pub fn flush_metrics(&mut self, step: u64) {
        let report = self.metrics.flush(step);
        for sink in &self.metrics_sinks {
            if let Err(e) = sink.log(&report) {
                counters::SINK_ERRORS_TOTAL.inc();
                warn!("Failed to log metrics: {}", e);
            }
        }
    }

    /// Save `step` with the data position reached when the last step
    /// completed, so an interrupted step is replayed after resuming.
    pub fn save_checkpoint(&self, step: u64) -> Result<PathBuf> {
        Checkpoint::new(step, self.completed_iter).save(&self.config.checkpoint_dir)
    }

    /// Run `steps` training steps after the current one
    pub async fn run(&mut self, steps: u64) -> Result<RunSummary> {
        let first_step = self.step + 1;
        let last_step = self.step + steps;
        let mut summary = RunSummary {
            run_id: self.run_id().to_string(),
            first_step,
            last_step,
            ..Default::default()
        };

        info!("Starting run {} at step {} ({} steps)", summary.run_id, first_step, steps);

        for step in first_step..=last_step {
            counters::CURRENT_STEP.set(step as i64);
            let item = self.next_item();

            match self.collect_trajectories(&item).await {
                Ok(GroupOutcome {
                    group: Some(group), ..
                }) => {
                    self.send_group(&group).await;
                    summary.groups_sent += 1;
                    if let Err(e) = self.add_rollouts_for_logging(&group, &item) {
                        warn!("Failed to record rollouts for logging: {}", e);
                    }
                }
                Ok(_) => {
                    debug!("Step {}: group discarded", step);
                    summary.groups_discarded += 1;
                }
                Err(e) => {
                    warn!("Step {}: skipping item: {}", step, e);
                    summary.steps_skipped += 1;
                }
            }

            if self.config.steps_per_eval > 0 && step % self.config.steps_per_eval == 0 {
                self.evaluate().await;
                summary.evaluations += 1;
            }

            self.flush_metrics(step);
            self.step = step;
            self.completed_iter = self.iter;

            if self.config.checkpoint_interval > 0 && step % self.config.checkpoint_interval == 0 {
                self.save_checkpoint(step)?;
            }
        }

        self.save_checkpoint(self.step)?;
        info!(
            "Run {} finished: {} groups sent, {} discarded, {} skipped",
            summary.run_id, summary.groups_sent, summary.groups_discarded, summary.steps_skipped
        );
        Ok(summary)
    }
}
