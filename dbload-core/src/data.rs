use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// One instantaneous reading of a process's resource usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// CPU usage in percent, per core (200% is two saturated cores).
    pub cpu_percent: f64,
    pub memory_megabytes: f64,
}

/// A timestamped [`Reading`] taken by the sampling loop.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Monotonic offset of the tick from the start of sampling.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    pub cpu_percent: f64,
    pub memory_megabytes: f64,
}

impl ResourceSample {
    pub fn new(timestamp: OffsetDateTime, elapsed: Duration, reading: Reading) -> Self {
        Self {
            timestamp,
            elapsed,
            cpu_percent: reading.cpu_percent,
            memory_megabytes: reading.memory_megabytes.max(0.),
        }
    }
}

impl fmt::Display for ResourceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{:.2}s cpu={:.1}% rss={:.1}MB",
            self.elapsed.as_secs_f64(),
            self.cpu_percent,
            self.memory_megabytes,
        )
    }
}
