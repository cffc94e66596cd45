//! ivrl Environment - Implied volatility prediction for RL fine-tuning
//!
//! Turns options market records into prompts, samples completions from an
//! OpenAI-compatible server, scores the predicted implied volatility, and
//! hands groups with a learning signal to the trainer.
//!
//! Main entry point is [`IvEnvironment`].

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::float_cmp)]

pub mod checkpoint;
pub mod counters;
pub mod dataset;
pub mod environment;
pub mod extract;
pub mod inference;
pub mod metrics;
pub mod prompt;
pub mod scoring;
pub mod settings;
pub mod sink;
pub mod tokenizer;

pub use checkpoint::Checkpoint;
pub use dataset::Dataset;
pub use environment::{IvEnvironment, RunSummary};
pub use extract::AnswerExtractor;
pub use inference::{CompletionBackend, CompletionRequest, OpenAiCompletionClient};
pub use metrics::{
    JsonlMetricsSink, MetricsReport, MetricsSink, MetricsTracker, TracingMetricsSink,
};
pub use scoring::{GroupOutcome, GroupScorer, RolloutScore};
pub use settings::{EnvConfig, InferenceConfig};
pub use sink::{GroupSink, HttpGroupSink, JsonlGroupSink};
pub use tokenizer::{ChatTemplate, TokenCodec};
