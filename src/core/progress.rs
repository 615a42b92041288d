use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::aggregator::MetricsAggregator;

/// Logs running totals every `period` until the stop flag is raised.
pub(crate) async fn share_progress_periodically(
    aggregator: Arc<MetricsAggregator>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    while !*stop.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                let Ok(snapshot) = aggregator.snapshot() else { break };
                tracing::info!(
                    iterations = snapshot.total_iterations,
                    successes = snapshot.success_count,
                    failures = snapshot.failure_count,
                    p50_us = snapshot.latency_us.p50,
                    p99_us = snapshot.latency_us.p99,
                    "progress"
                );
            }
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
