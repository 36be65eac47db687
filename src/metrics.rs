//! Metrics instrumentation for csv-sync.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the embedding
//! application chooses the exporter (Prometheus, OTEL, ...).
//!
//! # Metric Naming Convention
//! - `csv_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_bytes` suffix for size histograms

use metrics::{counter, gauge, histogram};

/// Record a completed queue task with its outcome (`success`, `error`).
pub fn record_task(queue: &str, status: &str) {
    counter!(
        "csv_sync_tasks_total",
        "queue" => queue.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one retried attempt for an operation.
pub fn record_retry(operation: &str) {
    counter!(
        "csv_sync_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Update the observable depth of a task queue.
pub fn set_queue_depth(queue: &str, depth: usize) {
    gauge!(
        "csv_sync_queue_depth",
        "queue" => queue.to_string()
    )
    .set(depth as f64);
}

/// Record a merge outcome (`created`, `skipped`, `merged`).
pub fn record_merge(outcome: &str) {
    counter!(
        "csv_sync_merges_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record bytes written to the remote store.
pub fn record_bytes_uploaded(bytes: usize) {
    histogram!("csv_sync_upload_bytes").record(bytes as f64);
}
