//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (per operation outcome, in-flight count)
//! - Engine stages (duration per stage and outcome)
//! - Artifact cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs completed by operation and outcome.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reframe_jobs_total", "Total jobs processed"),
        &["operation", "outcome"], // outcome: "done" or a PipelineError kind
    )
    .unwrap()
});

/// Jobs currently holding artifacts.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reframe_jobs_in_flight",
        "Number of jobs currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Engine stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reframe_stage_duration_seconds",
            "Duration of a single engine invocation",
        )
        .buckets(vec![
            0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0,
        ]),
        &["stage", "outcome"], // stage: "probe", "crop_detect", "transcode"
    )
    .unwrap()
});

// =============================================================================
// Cleanup Metrics
// =============================================================================

/// Artifacts removed by job cleanup or after delivery.
pub static ARTIFACTS_CLEANED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reframe_artifacts_cleaned_total",
        "Total artifacts removed from disk",
    )
    .unwrap()
});

/// Artifact removals that failed (logged, never raised).
pub static CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reframe_cleanup_failures_total",
        "Total artifact removals that failed",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(ARTIFACTS_CLEANED.clone()),
        Box::new(CLEANUP_FAILURES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        JOBS_TOTAL.with_label_values(&["convert", "done"]).inc();
        STAGE_DURATION
            .with_label_values(&["transcode", "success"])
            .observe(1.5);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"reframe_jobs_total".to_string()));
        assert!(names.contains(&"reframe_stage_duration_seconds".to_string()));
    }
}
