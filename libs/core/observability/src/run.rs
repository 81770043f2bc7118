//! Run-level metrics for a single aggregation pass.
//!
//! One run reads a billing period's worth of partitioned tables, computes
//! pod and storage usage summaries, and writes them out. These metrics
//! exist to answer two questions after the fact: how long did each phase
//! take, and how much data did it see.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Phases an aggregation run moves through, in order. Used to label
/// duration histograms so a dashboard can break down where time went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    ConnectivityCheck,
    LoadLabelAllowList,
    LoadCostCategoryRules,
    CapacityCalculation,
    PodAggregation,
    StorageAggregation,
    Write,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectivityCheck => "connectivity_check",
            Self::LoadLabelAllowList => "load_label_allow_list",
            Self::LoadCostCategoryRules => "load_cost_category_rules",
            Self::CapacityCalculation => "capacity_calculation",
            Self::PodAggregation => "pod_aggregation",
            Self::StorageAggregation => "storage_aggregation",
            Self::Write => "write",
        }
    }
}

/// Aggregator-wide metrics recorder.
pub struct AggregatorMetrics;

impl AggregatorMetrics {
    /// Record how long a run phase took.
    pub fn record_phase_duration(phase: RunPhase, duration_secs: f64) {
        histogram!(
            "aggregator_phase_duration_seconds",
            "phase" => phase.as_str()
        )
        .record(duration_secs);
    }

    /// Record the number of input rows read for a table.
    pub fn record_input_rows(table: &str, rows: u64) {
        counter!("aggregator_input_rows_total", "table" => table.to_string()).increment(rows);
    }

    /// Record the number of output summary rows produced.
    pub fn record_output_rows(rows: u64) {
        counter!("aggregator_output_rows_total").increment(rows);
    }

    /// Record a row dropped due to a data-level error (malformed row,
    /// unparseable value) as opposed to a fatal schema or connectivity
    /// error.
    pub fn record_data_error(table: &str, reason: &str) {
        counter!(
            "aggregator_data_errors_total",
            "table" => table.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    /// Record a chunk processed during streaming execution.
    pub fn record_chunk_processed(mode: &str) {
        counter!("aggregator_chunks_processed_total", "mode" => mode.to_string()).increment(1);
    }

    /// Record the process's peak resident set size, in bytes, once known
    /// at the end of a run.
    pub fn set_peak_rss_bytes(bytes: u64) {
        gauge!("aggregator_peak_rss_bytes").set(bytes as f64);
    }

    /// Record that a run finished, successfully or not.
    pub fn record_run_completed(success: bool) {
        counter!(
            "aggregator_runs_total",
            "status" => if success { "success" } else { "failed" }
        )
        .increment(1);
    }
}

/// Timer guard for a single run phase. Records on `stop()` or on drop,
/// whichever comes first.
pub struct PhaseTimer {
    phase: RunPhase,
    start: Instant,
    stopped: bool,
}

impl PhaseTimer {
    pub fn start(phase: RunPhase) -> Self {
        Self {
            phase,
            start: Instant::now(),
            stopped: false,
        }
    }

    /// Stop the timer and record the duration. Returns the elapsed time.
    pub fn stop(mut self) -> std::time::Duration {
        self.stopped = true;
        let elapsed = self.start.elapsed();
        AggregatorMetrics::record_phase_duration(self.phase, elapsed.as_secs_f64());
        elapsed
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if !self.stopped {
            AggregatorMetrics::record_phase_duration(self.phase, self.start.elapsed().as_secs_f64());
        }
    }
}
