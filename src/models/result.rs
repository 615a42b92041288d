use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Latency distribution, all values in microseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

/// Final statistics of one load test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// RFC 3339 wall clock time at which runners were released
    pub started_at: String,
    pub virtual_users: usize,
    pub duration_secs: f64,
    pub elapsed_secs: f64,
    pub total_iterations: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub iterations_per_second: f64,
    pub latency_us: LatencySummary,
    pub failures: BTreeMap<String, u64>,
}

/// Running totals while a test is still in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_iterations: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub latency_us: LatencySummary,
}
