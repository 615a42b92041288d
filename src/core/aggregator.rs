use std::collections::BTreeMap;
use std::time::Instant;

use histogram::Histogram;
use parking_lot::Mutex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::error::EngineError;
use crate::models::iteration_result::{FailureKind, IterationResult, Outcome};
use crate::models::result::{LatencySummary, ProgressSnapshot, RunReport};
use crate::models::test_config::TestConfig;

// 2^7 buckets per power of two, latencies up to 2^32us (~71 minutes)
const GROUPING_POWER: u8 = 7;
const MAX_VALUE_POWER: u8 = 32;
const MAX_LATENCY_US: u64 = (1u64 << MAX_VALUE_POWER) - 1;

/// Collects iteration results from every virtual user.
///
/// All state sits behind one mutex so concurrent `submit` calls can never lose
/// an update. `finalize` takes the state out, after which every call fails
/// with [`EngineError::Lifecycle`].
pub struct MetricsAggregator {
    config: TestConfig,
    state: Mutex<Option<AggregateState>>,
}

struct AggregateState {
    histogram: Histogram,
    total: u64,
    successes: u64,
    failures: u64,
    min_us: u64,
    max_us: u64,
    latency_sum_us: u128,
    failure_kinds: BTreeMap<FailureKind, u64>,
    started: Option<(Instant, OffsetDateTime)>,
}

impl MetricsAggregator {
    pub fn new(config: TestConfig) -> Result<Self, EngineError> {
        let histogram = Histogram::new(GROUPING_POWER, MAX_VALUE_POWER)
            .map_err(|e| EngineError::Internal(format!("latency histogram: {:?}", e)))?;
        Ok(MetricsAggregator {
            config,
            state: Mutex::new(Some(AggregateState {
                histogram,
                total: 0,
                successes: 0,
                failures: 0,
                min_us: u64::MAX,
                max_us: 0,
                latency_sum_us: 0,
                failure_kinds: BTreeMap::new(),
                started: None,
            })),
        })
    }

    /// Marks the instant runners were released; elapsed time is measured from here.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut guard = self.state.lock();
        let state = guard
            .as_mut()
            .ok_or(EngineError::Lifecycle("start after finalize"))?;
        state.started = Some((Instant::now(), OffsetDateTime::now_utc()));
        Ok(())
    }

    pub fn submit(&self, result: IterationResult) -> Result<(), EngineError> {
        let latency_us = u64::try_from(result.latency.as_micros()).unwrap_or(u64::MAX);
        let mut guard = self.state.lock();
        let state = guard
            .as_mut()
            .ok_or(EngineError::Lifecycle("submit after finalize"))?;

        state.total += 1;
        match result.outcome {
            Outcome::Success(_) => state.successes += 1,
            Outcome::Failure(kind) => {
                state.failures += 1;
                *state.failure_kinds.entry(kind).or_insert(0) += 1;
            }
        }
        state.min_us = state.min_us.min(latency_us);
        state.max_us = state.max_us.max(latency_us);
        state.latency_sum_us += latency_us as u128;
        if let Err(e) = state.histogram.increment(latency_us.min(MAX_LATENCY_US)) {
            tracing::warn!("failed to record latency {}us: {:?}", latency_us, e);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<ProgressSnapshot, EngineError> {
        let guard = self.state.lock();
        let state = guard
            .as_ref()
            .ok_or(EngineError::Lifecycle("snapshot after finalize"))?;
        Ok(ProgressSnapshot {
            total_iterations: state.total,
            success_count: state.successes,
            failure_count: state.failures,
            latency_us: state.latency_summary(),
        })
    }

    /// Produces the final report. Only the first call succeeds.
    pub fn finalize(&self) -> Result<RunReport, EngineError> {
        let state = self
            .state
            .lock()
            .take()
            .ok_or(EngineError::Lifecycle("finalize called more than once"))?;

        let (elapsed, started_at) = match state.started {
            Some((instant, wall)) => (instant.elapsed(), wall),
            None => (std::time::Duration::ZERO, OffsetDateTime::now_utc()),
        };
        let elapsed_secs = elapsed.as_secs_f64();
        let iterations_per_second = if elapsed_secs > 0.0 {
            state.total as f64 / elapsed_secs
        } else {
            0.0
        };
        let success_rate = if state.total > 0 {
            state.successes as f64 / state.total as f64 * 100.0
        } else {
            0.0
        };

        Ok(RunReport {
            started_at: started_at
                .format(&Rfc3339)
                .map_err(|e| EngineError::Internal(e.to_string()))?,
            virtual_users: self.config.virtual_users(),
            duration_secs: self.config.duration().as_secs_f64(),
            elapsed_secs,
            total_iterations: state.total,
            success_count: state.successes,
            failure_count: state.failures,
            success_rate,
            iterations_per_second,
            latency_us: state.latency_summary(),
            failures: state
                .failure_kinds
                .iter()
                .map(|(kind, count)| (kind.to_string(), *count))
                .collect(),
        })
    }
}

impl AggregateState {
    fn latency_summary(&self) -> LatencySummary {
        if self.total == 0 {
            return LatencySummary::default();
        }
        LatencySummary {
            min: self.min_us,
            max: self.max_us,
            mean: self.latency_sum_us as f64 / self.total as f64,
            p50: self.percentile(50.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
        }
    }

    // lower bound of the bucket, kept inside the observed range
    fn percentile(&self, p: f64) -> u64 {
        match self.histogram.percentile(p) {
            Ok(bucket) => (*bucket.range().start()).clamp(self.min_us, self.max_us),
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    fn aggregator() -> MetricsAggregator {
        MetricsAggregator::new(TestConfig::new(1, Duration::from_secs(1)).unwrap()).unwrap()
    }

    fn result(latency_ms: u64, outcome: Outcome) -> IterationResult {
        IterationResult::new(SystemTime::now(), Duration::from_millis(latency_ms), outcome)
    }

    #[test]
    fn counts_successes_and_failures() {
        let agg = aggregator();
        agg.submit(result(10, Outcome::Success(200))).unwrap();
        agg.submit(result(20, Outcome::Success(201))).unwrap();
        agg.submit(result(30, Outcome::Failure(FailureKind::Timeout))).unwrap();
        agg.submit(result(40, Outcome::Failure(FailureKind::Status(500)))).unwrap();

        let report = agg.finalize().unwrap();
        assert_eq!(report.total_iterations, 4);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.success_rate, 50.0);
        assert_eq!(report.latency_us.min, 10_000);
        assert_eq!(report.latency_us.max, 40_000);
        assert_eq!(report.latency_us.mean, 25_000.0);
        assert!(report.latency_us.p50 >= 10_000 && report.latency_us.p50 <= 40_000);
        assert_eq!(report.failures.get("timeout"), Some(&1));
        assert_eq!(report.failures.get("status:500"), Some(&1));
    }

    #[test]
    fn empty_report_is_all_zero() {
        let report = aggregator().finalize().unwrap();
        assert_eq!(report.total_iterations, 0);
        assert_eq!(report.latency_us, LatencySummary::default());
        assert_eq!(report.iterations_per_second, 0.0);
    }

    #[test]
    fn finalize_is_terminal() {
        let agg = aggregator();
        agg.finalize().unwrap();
        assert!(matches!(agg.finalize(), Err(EngineError::Lifecycle(_))));
        assert!(matches!(
            agg.submit(result(1, Outcome::Success(200))),
            Err(EngineError::Lifecycle(_))
        ));
        assert!(matches!(agg.snapshot(), Err(EngineError::Lifecycle(_))));
    }

    #[test]
    fn snapshot_does_not_finalize() {
        let agg = aggregator();
        agg.submit(result(5, Outcome::Success(200))).unwrap();
        assert_eq!(agg.snapshot().unwrap().total_iterations, 1);
        agg.submit(result(5, Outcome::Success(200))).unwrap();
        assert_eq!(agg.finalize().unwrap().total_iterations, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn no_lost_updates_under_concurrent_submission() {
        let agg = Arc::new(aggregator());
        let mut handles = Vec::new();
        for runner in 0..100u64 {
            let agg = agg.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100u64 {
                    let outcome = if (runner + i) % 3 == 0 {
                        Outcome::Failure(FailureKind::Connect)
                    } else {
                        Outcome::Success(200)
                    };
                    agg.submit(result(i, outcome)).unwrap();
                    if i % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let report = agg.finalize().unwrap();
        assert_eq!(report.total_iterations, 10_000);
        assert_eq!(report.success_count + report.failure_count, 10_000);
        assert_eq!(report.failures.get("connect"), Some(&report.failure_count));
    }
}
