use crate::ResourceSample;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::fmt;
use std::time::Duration;

/// Latency summary of the successful units of work.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub mean: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub p95: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub p99: Duration,
}

/// Statistics for a completed benchmark run
///
/// The only artifact a run hands to the outside world. Produced once all load has drained and
/// sampling has stopped; never modified afterwards.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Time until the target first accepted a connection.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub deployment: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub concurrency: usize,
    /// Units of work dispatched, successful or not.
    pub total_requests: u64,
    pub failed_requests: u64,
    pub throughput_rps: f64,
    pub latency: LatencyStats,
    pub resource_samples: Vec<ResourceSample>,
}

impl RunResult {
    pub fn successful_requests(&self) -> u64 {
        self.total_requests - self.failed_requests
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.
        } else {
            self.failed_requests as f64 / self.total_requests as f64
        }
    }

    pub fn mean_cpu_percent(&self) -> Option<f64> {
        if self.resource_samples.is_empty() {
            return None;
        }
        let sum: f64 = self.resource_samples.iter().map(|s| s.cpu_percent).sum();
        Some(sum / self.resource_samples.len() as f64)
    }

    pub fn peak_memory_megabytes(&self) -> Option<f64> {
        self.resource_samples
            .iter()
            .map(|s| s.memory_megabytes)
            .reduce(f64::max)
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} (failed={}), throughput={:.2}rps, mean={:?}, p95={:?}, p99={:?}, samples={}",
            self.total_requests,
            self.failed_requests,
            self.throughput_rps,
            self.latency.mean,
            self.latency.p95,
            self.latency.p99,
            self.resource_samples.len(),
        )
    }
}
