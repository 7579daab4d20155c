//! Statistics aggregation
//!
//! Percentiles use the nearest-rank rule: for `n` sorted measurements the p-th percentile is
//! the value at 1-based rank `ceil(p / 100 * n)`, clamped to `[1, n]`. No interpolation is
//! done, so every reported percentile is a latency that was actually observed.
use crate::driver::LoadOutcome;
use crate::error::Error;
use dbload_core::{LatencyStats, ResourceSample, RunResult};
use std::time::Duration;

/// Run-level facts the aggregator needs besides the collected data.
#[derive(Debug, Clone, Copy)]
pub struct RunShape {
    pub deployment: Duration,
    pub duration: Duration,
    pub concurrency: usize,
}

/// Fold a drained load phase and its resource samples into a [`RunResult`].
///
/// `throughput_rps` counts every dispatched unit, failed or not, over the configured duration.
pub fn aggregate(
    outcome: LoadOutcome,
    samples: Vec<ResourceSample>,
    shape: RunShape,
) -> Result<RunResult, Error> {
    let latency = latency_stats(&outcome.measurements)?;

    Ok(RunResult {
        deployment: shape.deployment,
        duration: shape.duration,
        concurrency: shape.concurrency,
        total_requests: outcome.total_dispatched,
        failed_requests: outcome.failed,
        throughput_rps: throughput(outcome.total_dispatched, shape.duration),
        latency,
        resource_samples: samples,
    })
}

pub fn latency_stats(measurements: &[Duration]) -> Result<LatencyStats, Error> {
    if measurements.is_empty() {
        return Err(Error::InsufficientData);
    }

    let mut sorted = measurements.to_vec();
    sorted.sort_unstable();

    // Sum in nanoseconds so the mean does not depend on input order.
    let total: u128 = sorted.iter().map(Duration::as_nanos).sum();
    let mean = Duration::from_nanos((total / sorted.len() as u128) as u64);

    Ok(LatencyStats {
        mean,
        p95: percentile(&sorted, 95.),
        p99: percentile(&sorted, 99.),
    })
}

/// Nearest-rank percentile of an ascending, non-empty slice.
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let n = sorted.len();
    let rank = (p * n as f64 / 100.).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

fn throughput(requests: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0. {
        requests as f64 / secs
    } else {
        0.
    }
}
