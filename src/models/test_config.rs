use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::error::EngineError;

/// Upper bound on concurrent virtual users; each one is a spawned task.
pub const MAX_VIRTUAL_USERS: usize = 100_000;

/// Validated run configuration. Fields are private so an invalid config can
/// never reach the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTestConfig", into = "RawTestConfig")]
pub struct TestConfig {
    virtual_users: usize,
    duration: Duration,
}

impl TestConfig {
    pub fn new(virtual_users: usize, duration: Duration) -> Result<Self, EngineError> {
        let config = TestConfig {
            virtual_users,
            duration,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from k6-style options, e.g. `(1000, "1s")`.
    pub fn from_options(vus: usize, duration: &str) -> Result<Self, EngineError> {
        Self::new(vus, parse_duration(duration)?)
    }

    pub fn virtual_users(&self) -> usize {
        self.virtual_users
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.virtual_users < 1 {
            return Err(EngineError::Config(
                "virtual users must be at least 1".to_string(),
            ));
        }
        if self.virtual_users > MAX_VIRTUAL_USERS {
            return Err(EngineError::Config(format!(
                "virtual users must be at most {}",
                MAX_VIRTUAL_USERS
            )));
        }
        if self.duration.is_zero() {
            return Err(EngineError::Config(
                "duration must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for TestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} VUs for {}", self.virtual_users, format_duration(self.duration))
    }
}

// k6 option names on the wire
#[derive(Serialize, Deserialize)]
struct RawTestConfig {
    vus: usize,
    duration: String,
}

impl TryFrom<RawTestConfig> for TestConfig {
    type Error = EngineError;

    fn try_from(raw: RawTestConfig) -> Result<Self, Self::Error> {
        TestConfig::from_options(raw.vus, &raw.duration)
    }
}

impl From<TestConfig> for RawTestConfig {
    fn from(config: TestConfig) -> Self {
        RawTestConfig {
            vus: config.virtual_users,
            duration: format_duration(config.duration),
        }
    }
}

/// Parses durations such as `"1s"`, `"500ms"`, `"2m"` or `"1h30m"`.
/// A bare number is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, EngineError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(EngineError::Config("empty duration".to_string()));
    }
    if let Ok(secs) = input.parse::<f64>() {
        return seconds(secs, input);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| invalid_duration(input))?;
        if number_len == 0 {
            return Err(invalid_duration(input));
        }
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos: u64 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(invalid_duration(input)),
        };
        rest = &rest[unit_len..];

        // whole numbers stay exact so formatted durations read back unchanged
        let part = match number.parse::<u64>() {
            Ok(whole) => whole
                .checked_mul(unit_nanos)
                .map(Duration::from_nanos)
                .ok_or_else(|| invalid_duration(input))?,
            Err(_) => {
                let value: f64 = number.parse().map_err(|_| invalid_duration(input))?;
                seconds(value * unit_nanos as f64 / 1e9, input)?
            }
        };
        total = total
            .checked_add(part)
            .ok_or_else(|| invalid_duration(input))?;
    }
    Ok(total)
}

fn seconds(secs: f64, input: &str) -> Result<Duration, EngineError> {
    Duration::try_from_secs_f64(secs).map_err(|_| invalid_duration(input))
}

fn invalid_duration(input: &str) -> EngineError {
    EngineError::Config(format!("invalid duration: {:?}", input))
}

/// Formats in the largest unit that keeps the value exact.
pub(crate) fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos % 1_000_000_000 == 0 {
        format!("{}s", duration.as_secs())
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", duration.as_millis())
    } else if nanos % 1_000 == 0 {
        format!("{}us", duration.as_micros())
    } else {
        format!("{}ns", nanos)
    }
}
