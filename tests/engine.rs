use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use order_storm_engine::{
    http_iteration, run, run_with_shutdown, EngineError, HttpMethod, Outcome, ReqwestTransport,
    RequestSpec, RunOptions, TestConfig,
};

fn quiet() -> RunOptions {
    RunOptions {
        progress_interval: None,
    }
}

#[test]
fn invalid_configs_never_reach_the_scheduler() {
    assert!(matches!(
        TestConfig::new(0, Duration::from_secs(1)),
        Err(EngineError::Config(_))
    ));
    assert!(matches!(
        TestConfig::new(1, Duration::ZERO),
        Err(EngineError::Config(_))
    ));
    assert!(matches!(
        TestConfig::from_options(1, "0s"),
        Err(EngineError::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_vu_fast_iterations_all_succeed() {
    let config = TestConfig::from_options(1, "1s").unwrap();
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let iteration = move || {
        counter.fetch_add(1, Ordering::Relaxed);
        async { Outcome::Success(200) }
    };

    let report = run(config, iteration).await.unwrap();
    assert!(report.total_iterations > 100, "only {} iterations", report.total_iterations);
    assert_eq!(report.total_iterations, calls.load(Ordering::Relaxed));
    assert_eq!(report.failure_count, 0);
    assert_eq!(report.success_count, report.total_iterations);
    assert!(report.elapsed_secs >= 1.0);
    assert!(report.latency_us.p99 < 10_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreachable_target_fails_every_iteration_but_completes() {
    let config = TestConfig::from_options(4, "300ms").unwrap();
    let transport = Arc::new(ReqwestTransport::new(Some(Duration::from_secs(1))).unwrap());
    // nothing listens on port 1
    let iteration = http_iteration(transport, || {
        RequestSpec::new(HttpMethod::Post, "http://127.0.0.1:1/submit_order").body("{}")
    });

    let report = run_with_shutdown(config, iteration, quiet(), std::future::pending())
        .await
        .unwrap();
    assert!(report.total_iterations > 0);
    assert_eq!(report.success_count, 0);
    assert_eq!(report.failure_count, report.total_iterations);
    assert_eq!(report.success_rate, 0.0);
    assert_eq!(report.failures.values().sum::<u64>(), report.total_iterations);
}
