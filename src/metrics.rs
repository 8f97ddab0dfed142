//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Event admission and dispatch outcomes
//! - Per-cluster sync results
//! - Conflict retry attempts
//! - Dead-cluster downgrades
//! - Operation latency
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_`; counters end in `_total`,
//! histograms track durations in seconds.

use metrics::{counter, histogram};
use std::time::{Duration, Instant};
use tracing::debug;

/// Record an event accepted or filtered at the gate.
pub fn record_event(event: &str, outcome: &str) {
    counter!("replication_events_total", "event" => event.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record one per-cluster sync result.
pub fn record_cluster_sync(cluster: &str, event: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_cluster_syncs_total",
        "cluster" => cluster.to_string(),
        "event" => event.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a sync skipped because the target cluster is dead.
pub fn record_dead_cluster_skip(cluster: &str, operation: &str) {
    counter!(
        "replication_dead_cluster_skips_total",
        "cluster" => cluster.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record one attempt of the conflict retry engine.
pub fn record_conflict_retry(cluster: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_conflict_retries_total",
        "cluster" => cluster.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a state-registry mirror call.
pub fn record_state_mirror(cluster: &str, event: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_state_mirror_total",
        "cluster" => cluster.to_string(),
        "event" => event.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record operation latency.
pub fn record_operation_latency(operation: &str, cluster: &str, duration: Duration) {
    histogram!(
        "replication_operation_duration_seconds",
        "operation" => operation.to_string(),
        "cluster" => cluster.to_string()
    )
    .record(duration.as_secs_f64());
}

/// RAII timer that records operation latency when dropped.
///
/// Mirrors the deferred elapsed-time logging around every handler call and
/// per-cluster sync: construct it on entry, let it drop on every exit path.
pub struct OpTimer {
    operation: String,
    cluster: String,
    name: String,
    start: Instant,
}

impl OpTimer {
    pub fn new(operation: impl Into<String>, cluster: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            cluster: cluster.into(),
            name: name.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        record_operation_latency(&self.operation, &self.cluster, elapsed);
        debug!(
            operation = %self.operation,
            cluster = %self.cluster,
            name = %self.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "operation finished"
        );
    }
}
