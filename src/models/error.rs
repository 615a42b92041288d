use std::time::Duration;
use thiserror::Error;

/// Errors raised by the engine itself. Iteration failures are never reported
/// through this type; they are recorded as outcomes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("aggregator lifecycle violation: {0}")]
    Lifecycle(&'static str),
    #[error("virtual user {0} panicked")]
    RunnerPanicked(usize),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure of a single request at the transport layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    /// Carries the configured client timeout, if one was set.
    #[error("request timed out{}", .0.map(|d| format!(" after {:?}", d)).unwrap_or_default())]
    Timeout(Option<Duration>),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
