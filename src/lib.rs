//! A virtual-user load generation engine.
//!
//! [`run`] starts the configured number of virtual users, each looping over
//! one iteration function until the test duration expires, and returns the
//! aggregated [`RunReport`]. Stopping is cooperative: an iteration already in
//! flight at the deadline is finished and counted.
//!
//! ```no_run
//! use std::sync::Arc;
//! use order_storm_engine::{http_iteration, run, OrderPayload, ReqwestTransport, RequestSpec, TestConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = TestConfig::from_options(1000, "1s")?;
//! let transport = Arc::new(ReqwestTransport::new(None)?);
//! let body = serde_json::to_vec(&OrderPayload::default())?;
//! let iteration = http_iteration(transport, move || {
//!     RequestSpec::new(order_storm_engine::HttpMethod::Post, "http://127.0.0.1:8000/submit_order")
//!         .header("Content-Type", "application/json")
//!         .body(body.clone())
//! });
//! let report = run(config, iteration).await?;
//! println!("{} iterations, {} failed", report.total_iterations, report.failure_count);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod models;

pub use crate::core::aggregator::MetricsAggregator;
pub use crate::core::execute::{run, run_with_shutdown, RunOptions};
pub use crate::core::runner::run_loop;
pub use crate::core::show_result_with_table::render_result_table;
pub use crate::core::transport::{http_iteration, outcome_of, ReqwestTransport, Response, Transport};
pub use crate::models::error::{EngineError, TransportError};
pub use crate::models::iteration_result::{FailureKind, IterationResult, Outcome};
pub use crate::models::order::{OrderPayload, OrderType, Side};
pub use crate::models::request_spec::{HttpMethod, RequestSpec};
pub use crate::models::result::{LatencySummary, ProgressSnapshot, RunReport};
pub use crate::models::test_config::{parse_duration, TestConfig};
