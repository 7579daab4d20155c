//! Resource sampling loop
//!
//! A periodic task that reads the target's resource usage once per tick until cancelled.
//! Cancellation is only observed between ticks: a read already in flight is finished and kept.
mod ticker;

use crate::resource::{ProcessHandle, ResourceSampler};
use dbload_core::ResourceSample;
#[cfg(feature = "metrics")]
use dbload_core::DEFAULT_LABELS;
use std::time::Duration;
use ticker::Ticker;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

pub struct SamplingLoop {
    interval: Duration,
    read_timeout: Duration,
}

impl SamplingLoop {
    /// Sample every `interval`, giving each read up to one interval to complete.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            read_timeout: interval,
        }
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Collect samples until `stop` is cancelled.
    ///
    /// The first sample is taken immediately. Reads that fail or exceed the read timeout are
    /// skipped. Once `stop` has been observed no new read is started.
    #[instrument(name = "sampling", skip_all, fields(pid = process.pid()))]
    pub async fn run<S: ResourceSampler>(
        self,
        mut sampler: S,
        process: ProcessHandle,
        stop: CancellationToken,
    ) -> Vec<ResourceSample> {
        let mut ticker = Ticker::new(self.interval);
        let mut samples = vec![];
        let mut skipped = 0usize;
        let mut first_tick = None;

        debug!("Sampling {process} every {ticker}");
        loop {
            let tick = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                tick = ticker.tick() => tick,
            };
            let elapsed = tick - *first_tick.get_or_insert(tick);
            let timestamp = OffsetDateTime::now_utc();

            match tokio::time::timeout(self.read_timeout, sampler.sample(&process)).await {
                Ok(Ok(reading)) => {
                    let sample = ResourceSample::new(timestamp, elapsed, reading);
                    trace!("Sample {}: {sample}", samples.len());

                    #[cfg(feature = "metrics")]
                    {
                        metrics::gauge!(DEFAULT_LABELS.cpu).set(sample.cpu_percent);
                        metrics::gauge!(DEFAULT_LABELS.memory).set(sample.memory_megabytes);
                    }

                    samples.push(sample);
                }
                Ok(Err(err)) => {
                    skipped += 1;
                    warn!("Skipping sample at +{:.2}s: {err}", elapsed.as_secs_f64());
                }
                Err(_) => {
                    skipped += 1;
                    warn!(
                        "Skipping sample at +{:.2}s: read exceeded {}",
                        elapsed.as_secs_f64(),
                        humantime::format_duration(self.read_timeout)
                    );
                }
            }
        }

        info!(
            "Sampling stopped: {} samples, {skipped} skipped, period {}",
            samples.len(),
            humantime::format_duration(ticker.period())
        );
        samples
    }
}

/// Sample `process` every `interval` until `stop` is cancelled.
pub async fn run_sampling<S: ResourceSampler>(
    sampler: S,
    process: ProcessHandle,
    interval: Duration,
    stop: CancellationToken,
) -> Vec<ResourceSample> {
    SamplingLoop::new(interval).run(sampler, process, stop).await
}
