use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::models::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    Connect,
    Timeout,
    Protocol,
    /// The iteration function panicked.
    Panic,
    /// The server answered with a non-2xx status.
    Status(u16),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Connect => f.write_str("connect"),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Protocol => f.write_str("protocol"),
            FailureKind::Panic => f.write_str("panic"),
            FailureKind::Status(code) => write!(f, "status:{}", code),
        }
    }
}

impl From<&TransportError> for FailureKind {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Connect(_) => FailureKind::Connect,
            TransportError::Timeout(_) => FailureKind::Timeout,
            TransportError::Protocol(_) | TransportError::InvalidRequest(_) => FailureKind::Protocol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success(u16),
    Failure(FailureKind),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationResult {
    pub start_time: SystemTime,
    pub latency: Duration,
    pub outcome: Outcome,
}

impl IterationResult {
    pub fn new(start_time: SystemTime, latency: Duration, outcome: Outcome) -> Self {
        IterationResult {
            start_time,
            latency,
            outcome,
        }
    }
}
