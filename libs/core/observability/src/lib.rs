//! Observability utilities for the usage aggregation engine.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Run-level metrics for aggregation phase durations, row counts, and
//!   data errors
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, AggregatorMetrics, RunPhase};
//!
//! // Initialize metrics recorder
//! init_metrics();
//!
//! let timer = observability::run::PhaseTimer::start(RunPhase::PodAggregation);
//! // ... run the pod aggregator ...
//! timer.stop();
//! ```

pub mod run;

pub use run::{AggregatorMetrics, PhaseTimer, RunPhase};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at process startup. Returns the
/// `PrometheusHandle` used to render the `/metrics` text format for a
/// scrape, if one is exposed by the caller.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call `init_metrics` first).
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render the current metrics snapshot in Prometheus text exposition
/// format, if the recorder has been initialized.
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_histogram!(
        "aggregator_phase_duration_seconds",
        "Duration of each aggregation run phase"
    );
    describe_counter!(
        "aggregator_input_rows_total",
        "Total input rows read per source table"
    );
    describe_counter!(
        "aggregator_output_rows_total",
        "Total output summary rows produced"
    );
    describe_counter!(
        "aggregator_data_errors_total",
        "Rows dropped due to data-level errors, by table and reason"
    );
    describe_counter!(
        "aggregator_chunks_processed_total",
        "Chunks processed during streaming execution, by mode"
    );
    describe_gauge!(
        "aggregator_peak_rss_bytes",
        "Peak resident set size observed during a run"
    );
    describe_counter!(
        "aggregator_runs_total",
        "Total aggregation runs by completion status"
    );
}
