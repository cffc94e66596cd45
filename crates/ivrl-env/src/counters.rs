//! Prometheus process counters for the environment
//!
//! These track the health of the pipeline (requests, drops, failures), as
//! opposed to the training metrics in [`crate::metrics`].

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::LazyLock;

/// Global Prometheus registry for ivrl counters
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let registry = Registry::new();

    registry.register(Box::new(INFERENCE_REQUESTS_TOTAL.clone())).unwrap();
    registry.register(Box::new(INFERENCE_ERRORS_TOTAL.clone())).unwrap();
    registry.register(Box::new(ROLLOUTS_SCORED_TOTAL.clone())).unwrap();
    registry.register(Box::new(EXTRACTION_FAILURES_TOTAL.clone())).unwrap();
    registry.register(Box::new(GROUPS_DISCARDED_TOTAL.clone())).unwrap();
    registry.register(Box::new(GROUPS_SENT_TOTAL.clone())).unwrap();
    registry.register(Box::new(SINK_ERRORS_TOTAL.clone())).unwrap();
    registry.register(Box::new(CURRENT_STEP.clone())).unwrap();

    registry
});

// =============================================================================
// Inference
// =============================================================================

/// Completion requests by split
pub static INFERENCE_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("requests_total", "Total completion requests")
            .namespace("ivrl")
            .subsystem("inference"),
        &["split"],
    )
    .unwrap()
});

/// Failed completion requests by split
pub static INFERENCE_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("errors_total", "Total failed completion requests")
            .namespace("ivrl")
            .subsystem("inference"),
        &["split"],
    )
    .unwrap()
});

// =============================================================================
// Scoring
// =============================================================================

pub static ROLLOUTS_SCORED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ivrl_rollouts_scored_total", "Total rollouts kept in scored groups").unwrap()
});

pub static EXTRACTION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ivrl_extraction_failures_total",
        "Total kept rollouts whose answer could not be extracted",
    )
    .unwrap()
});

/// Groups dropped because every reward was identical
pub static GROUPS_DISCARDED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ivrl_groups_discarded_total", "Total groups without learning signal").unwrap()
});

// =============================================================================
// Sinks
// =============================================================================

pub static GROUPS_SENT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ivrl_groups_sent_total", "Total scored groups handed to sinks").unwrap()
});

pub static SINK_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ivrl_sink_errors_total", "Total failed sink deliveries").unwrap()
});

pub static CURRENT_STEP: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("ivrl_current_step", "Training step currently being processed").unwrap()
});

/// Encode all counters in Prometheus text format
pub fn encode_counters() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_counters() {
        ROLLOUTS_SCORED_TOTAL.inc();
        INFERENCE_REQUESTS_TOTAL.with_label_values(&["train"]).inc();

        let text = encode_counters();
        assert!(text.contains("ivrl_rollouts_scored_total"));
        assert!(text.contains("ivrl_inference_requests_total"));
    }
}
