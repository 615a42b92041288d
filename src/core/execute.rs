use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, Barrier};

use crate::core::aggregator::MetricsAggregator;
use crate::core::progress::share_progress_periodically;
use crate::core::runner::run_loop;
use crate::models::error::EngineError;
use crate::models::iteration_result::Outcome;
use crate::models::result::RunReport;
use crate::models::test_config::TestConfig;

/// Ambient settings of a run that do not change what is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// How often running totals are logged, `None` disables progress logging.
    pub progress_interval: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            progress_interval: Some(Duration::from_secs(1)),
        }
    }
}

/// Runs `iteration` on `config.virtual_users()` concurrent virtual users for
/// `config.duration()` and returns the aggregated report.
pub async fn run<F, Fut>(config: TestConfig, iteration: F) -> Result<RunReport, EngineError>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    run_with_shutdown(config, iteration, RunOptions::default(), future::pending()).await
}

/// Like [`run`], but stops early when `shutdown` resolves. Early stop uses the
/// same cooperative signal as the deadline, so in-flight iterations are kept.
pub async fn run_with_shutdown<F, Fut, S>(
    config: TestConfig,
    iteration: F,
    options: RunOptions,
    shutdown: S,
) -> Result<RunReport, EngineError>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
    S: Future<Output = ()>,
{
    config.validate()?;
    let virtual_users = config.virtual_users();
    let aggregator = Arc::new(MetricsAggregator::new(config)?);
    let (stop_tx, stop_rx) = watch::channel(false);
    // every runner plus the scheduler itself
    let start_line = Arc::new(Barrier::new(virtual_users + 1));

    tracing::info!("spawning {} virtual users", virtual_users);
    let mut handles = Vec::with_capacity(virtual_users);
    for vu in 0..virtual_users {
        let iteration = iteration.clone();
        let stop = stop_rx.clone();
        let aggregator = aggregator.clone();
        let start_line = start_line.clone();
        handles.push(tokio::spawn(async move {
            start_line.wait().await;
            run_loop(vu, iteration, stop, aggregator).await
        }));
    }

    start_line.wait().await;
    aggregator.start()?;
    tracing::info!("running {}", config);

    let progress = options.progress_interval.map(|period| {
        tokio::spawn(share_progress_periodically(
            aggregator.clone(),
            period,
            stop_rx.clone(),
        ))
    });

    tokio::select! {
        _ = tokio::time::sleep(config.duration()) => {
            tracing::info!("duration elapsed, stopping virtual users");
        }
        _ = shutdown => {
            tracing::info!("shutdown requested, stopping virtual users early");
        }
    }
    stop_tx.send_replace(true);

    let mut first_error = None;
    for (vu, joined) in join_all(handles).await.into_iter().enumerate() {
        let err = match joined {
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => e,
            Err(e) if e.is_panic() => EngineError::RunnerPanicked(vu),
            Err(e) => EngineError::Internal(format!("virtual user {}: {}", vu, e)),
        };
        tracing::error!("virtual user {} failed: {}", vu, err);
        first_error.get_or_insert(err);
    }
    if let Some(progress) = progress {
        if let Err(e) = progress.await {
            tracing::warn!("progress reporter ended abnormally: {}", e);
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let report = aggregator.finalize()?;
    tracing::info!(
        "finished {} iterations ({} failed) in {:.3}s",
        report.total_iterations,
        report.failure_count,
        report.elapsed_secs
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::iteration_result::FailureKind;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn quiet() -> RunOptions {
        RunOptions {
            progress_interval: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn counts_add_up() {
        let config = TestConfig::new(8, Duration::from_millis(200)).unwrap();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let iteration = move || {
            let n = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                if n % 4 == 0 {
                    Outcome::Failure(FailureKind::Status(500))
                } else {
                    Outcome::Success(200)
                }
            }
        };

        let report = run_with_shutdown(config, iteration, quiet(), future::pending())
            .await
            .unwrap();
        assert!(report.total_iterations > 0);
        assert_eq!(report.total_iterations, calls.load(Ordering::Relaxed));
        assert_eq!(report.success_count + report.failure_count, report.total_iterations);
        assert_eq!(report.virtual_users, 8);
        assert!(report.elapsed_secs >= 0.2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_virtual_user_runs_one_loop() {
        // iterations outlast the run, so each VU gets exactly one
        let config = TestConfig::new(16, Duration::from_millis(200)).unwrap();
        let iteration = || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Outcome::Success(200)
        };
        let report = run_with_shutdown(config, iteration, quiet(), future::pending())
            .await
            .unwrap();
        assert_eq!(report.total_iterations, 16);
        assert_eq!(report.success_count, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn in_flight_iteration_finishes_past_deadline() {
        let config = TestConfig::new(1, Duration::from_millis(50)).unwrap();
        let iteration = || async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Outcome::Success(200)
        };
        let report = run_with_shutdown(config, iteration, quiet(), future::pending())
            .await
            .unwrap();
        assert_eq!(report.total_iterations, 1);
        assert_eq!(report.success_count, 1);
        assert!(report.elapsed_secs >= 0.3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_stops_early() {
        let config = TestConfig::new(2, Duration::from_secs(60)).unwrap();
        let iteration = || async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Outcome::Success(200)
        };
        let shutdown = async { tokio::time::sleep(Duration::from_millis(100)).await };
        let started = std::time::Instant::now();
        let report = run_with_shutdown(config, iteration, RunOptions::default(), shutdown)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(report.total_iterations > 0);
        assert_eq!(report.failure_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_iteration_still_yields_a_report() {
        let config = TestConfig::new(2, Duration::from_millis(50)).unwrap();
        let iteration = || async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            if true {
                panic!("scenario bug");
            }
            Outcome::Success(200)
        };
        let report = run_with_shutdown(config, iteration, quiet(), future::pending())
            .await
            .unwrap();
        assert!(report.total_iterations > 0);
        assert_eq!(report.failure_count, report.total_iterations);
        assert_eq!(report.failures.get("panic"), Some(&report.total_iterations));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_the_run_stops_virtual_users() {
        let config = TestConfig::new(2, Duration::from_secs(60)).unwrap();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let iteration = move || {
            counter.fetch_add(1, Ordering::Relaxed);
            async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Outcome::Success(200)
            }
        };

        let cancelled = tokio::time::timeout(
            Duration::from_millis(100),
            run_with_shutdown(config, iteration, quiet(), future::pending()),
        )
        .await;
        assert!(cancelled.is_err());

        // let in-flight iterations drain
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_drop = calls.load(Ordering::Relaxed);
        assert!(after_drop > 0);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(calls.load(Ordering::Relaxed), after_drop);
    }
}
