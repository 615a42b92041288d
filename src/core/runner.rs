use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use futures::FutureExt;
use tokio::sync::watch;

use crate::core::aggregator::MetricsAggregator;
use crate::models::error::EngineError;
use crate::models::iteration_result::{FailureKind, IterationResult, Outcome};

/// Runs one virtual user until `stop` turns true, or its sender is dropped,
/// and returns how many iterations it completed.
///
/// The stop flag is only read between iterations, so an iteration that is in
/// flight when the deadline passes is always finished and recorded. A panic
/// inside the iteration is recorded as [`FailureKind::Panic`].
pub async fn run_loop<F, Fut>(
    vu: usize,
    iteration: F,
    stop: watch::Receiver<bool>,
    aggregator: Arc<MetricsAggregator>,
) -> Result<u64, EngineError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Outcome>,
{
    let mut iterations = 0u64;
    while stop.has_changed().is_ok() && !*stop.borrow() {
        let start_time = SystemTime::now();
        let start = Instant::now();
        let outcome = match AssertUnwindSafe(async { iteration().await })
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("iteration of virtual user {} panicked", vu);
                Outcome::Failure(FailureKind::Panic)
            }
        };
        aggregator.submit(IterationResult::new(start_time, start.elapsed(), outcome))?;
        iterations += 1;
        // iterations that never suspend would otherwise starve the deadline timer
        tokio::task::yield_now().await;
    }
    tracing::debug!("virtual user {} stopped after {} iterations", vu, iterations);
    Ok(iterations)
}
