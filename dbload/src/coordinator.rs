//! Run coordination
//!
//! Sequences one benchmark run: readiness probing, then sampling and load side by side, then an
//! ordered shutdown. Sampling is only told to stop once the load driver has drained every unit
//! of work, so the resource series covers the whole loaded period plus the drain tail.
use crate::aggregate::{aggregate, RunShape};
use crate::driver::LoadDriver;
use crate::error::Error;
use crate::executor::QueryExecutor;
use crate::probe::{ConnectivityCheck, ReadinessProber};
use crate::resource::{ProcessHandle, ResourceSampler};
use crate::sampling::SamplingLoop;
use dbload_core::{RunConfig, RunResult};
use humantime::format_duration;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Lifecycle of a run. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    NotStarted,
    Probing,
    Loading,
    Draining,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NotStarted => "not started",
            Phase::Probing => "probing",
            Phase::Loading => "loading",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct Coordinator<E, S, C> {
    config: RunConfig,
    executor: Arc<E>,
    sampler: Option<S>,
    check: C,
    process: ProcessHandle,
    history: Vec<Phase>,
}

impl<E, S, C> Coordinator<E, S, C>
where
    E: QueryExecutor,
    S: ResourceSampler,
    C: ConnectivityCheck,
{
    pub fn new(
        config: RunConfig,
        executor: E,
        sampler: S,
        check: C,
        process: ProcessHandle,
    ) -> Self {
        Self {
            config,
            executor: Arc::new(executor),
            sampler: Some(sampler),
            check,
            process,
            history: vec![Phase::NotStarted],
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut RunConfig {
        &mut self.config
    }

    pub fn phase(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::NotStarted)
    }

    /// Every phase this run has entered, in order.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Execute the run. A coordinator runs at most once.
    #[instrument(name = "benchmark", skip_all, fields(endpoint = %self.config.endpoint))]
    pub async fn run(&mut self) -> Result<RunResult, Error> {
        if self.phase() != Phase::NotStarted {
            return Err(Error::AlreadyStarted);
        }
        self.config.validate()?;
        let sampler = self.sampler.take().ok_or(Error::AlreadyStarted)?;
        info!("Starting benchmark: {}", self.config);

        self.transition(Phase::Probing);
        let deployment = ReadinessProber::new(&self.check)
            .attempt_timeout(self.config.probe_timeout)
            .backoff(self.config.probe_backoff)
            .wait_until_ready(&self.config.endpoint, self.config.readiness_timeout)
            .await?;

        // Sampling starts first so the series covers the first dispatched unit.
        let stop = CancellationToken::new();
        let sampling = tokio::spawn(
            SamplingLoop::new(self.config.sample_interval)
                .read_timeout(self.config.sample_timeout())
                .run(sampler, self.process, stop.clone()),
        );
        // Stops the sampling task if this future is dropped mid-run.
        let stop_guard = stop.drop_guard();

        self.transition(Phase::Loading);
        let driver = LoadDriver::new(self.executor.clone(), self.config.concurrency)
            .request_timeout(self.config.request_timeout)
            .rate_limit(self.config.rate_limit);
        let deadline = Instant::now() + self.config.duration;
        let load = driver.run_until(deadline);
        tokio::pin!(load);

        let drained = tokio::select! {
            biased;
            _ = tokio::time::sleep_until(deadline) => None,
            outcome = &mut load => Some(outcome),
        };
        self.transition(Phase::Draining);
        let outcome = match drained {
            Some(outcome) => outcome,
            None => load.await,
        };
        debug!(
            "Load drained {} after the deadline",
            format_duration(Instant::now().saturating_duration_since(deadline))
        );

        let stop = stop_guard.disarm();
        stop.cancel();
        let samples = sampling.await?;
        self.transition(Phase::Stopped);

        let result = aggregate(
            outcome,
            samples,
            RunShape {
                deployment,
                duration: self.config.duration,
                concurrency: self.config.concurrency.get(),
            },
        )?;
        info!("Benchmark complete: {result}");
        Ok(result)
    }

    fn transition(&mut self, next: Phase) {
        let current = self.phase();
        debug_assert!(next > current, "{current} -> {next}");
        info!("Phase {current} -> {next}");
        self.history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorError;
    use crate::probe::ProbeError;
    use crate::resource::SamplerError;
    use dbload_core::Reading;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct FixedLatency(Duration);

    impl QueryExecutor for FixedLatency {
        async fn execute(&self) -> Result<(), ExecutorError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    struct AlwaysFails;

    impl QueryExecutor for AlwaysFails {
        async fn execute(&self) -> Result<(), ExecutorError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(ExecutorError::Rejected("access denied".to_string()))
        }
    }

    /// Notes any read that happens after the load finished.
    #[derive(Clone)]
    struct Watchful {
        load_done: Arc<AtomicBool>,
        late_reads: Arc<AtomicBool>,
    }

    impl ResourceSampler for Watchful {
        async fn sample(&mut self, _process: &ProcessHandle) -> Result<Reading, SamplerError> {
            if self.load_done.load(Ordering::SeqCst) {
                self.late_reads.store(true, Ordering::SeqCst);
            }
            Ok(Reading {
                cpu_percent: 42.,
                memory_megabytes: 512.,
            })
        }
    }

    struct Up;

    impl ConnectivityCheck for Up {
        async fn probe(&self, _endpoint: &str, _timeout: Duration) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    struct Down;

    impl ConnectivityCheck for Down {
        async fn probe(&self, _endpoint: &str, _timeout: Duration) -> Result<(), ProbeError> {
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into())
        }
    }

    fn config(duration: Duration, concurrency: usize) -> RunConfig {
        RunConfig {
            duration,
            concurrency: NonZeroUsize::new(concurrency).unwrap(),
            ..RunConfig::new("db:3306")
        }
    }

    fn watchful() -> Watchful {
        Watchful {
            load_done: Arc::new(AtomicBool::new(false)),
            late_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    async fn full_run() {
        let mut coordinator = Coordinator::new(
            config(Duration::from_secs(2), 5),
            FixedLatency(Duration::from_millis(100)),
            watchful(),
            Up,
            ProcessHandle::current(),
        );

        let result = coordinator.run().await.unwrap();

        assert_eq!(
            coordinator.history(),
            &[
                Phase::NotStarted,
                Phase::Probing,
                Phase::Loading,
                Phase::Draining,
                Phase::Stopped
            ]
        );
        assert!((95..=105).contains(&result.total_requests));
        assert_eq!(result.failed_requests, 0);
        assert!((result.throughput_rps - 50.).abs() <= 2.5);
        assert!(result.latency.mean >= Duration::from_millis(100));
        assert!(result.latency.mean < Duration::from_millis(105));
        assert_eq!(result.concurrency, 5);
        assert_eq!(result.deployment, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn samples_cover_the_whole_run() {
        let mut coordinator = Coordinator::new(
            config(Duration::from_secs(3), 2),
            FixedLatency(Duration::from_millis(100)),
            watchful(),
            Up,
            ProcessHandle::current(),
        );

        let result = coordinator.run().await.unwrap();
        let samples = result.resource_samples.len();
        assert!(samples == 3 || samples == 4, "{samples} samples");
        assert_eq!(result.mean_cpu_percent(), Some(42.));
    }

    #[tokio::test(start_paused = true)]
    async fn sampling_outlives_the_drain() {
        // A single slow unit keeps the driver draining long after the deadline.
        let sampler = watchful();
        let mut coordinator = Coordinator::new(
            config(Duration::from_millis(500), 1),
            FixedLatency(Duration::from_millis(4_200)),
            sampler.clone(),
            Up,
            ProcessHandle::current(),
        );

        let result = coordinator.run().await.unwrap();
        sampler.load_done.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(result.total_requests, 1);
        assert_eq!(result.resource_samples.len(), 5);
        assert!(!sampler.late_reads.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_failure_skips_loading() {
        let sampler = watchful();
        let mut coordinator = Coordinator::new(
            RunConfig {
                readiness_timeout: Duration::from_secs(5),
                ..config(Duration::from_secs(2), 5)
            },
            FixedLatency(Duration::from_millis(100)),
            sampler.clone(),
            Down,
            ProcessHandle::current(),
        );

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, Error::ReadinessTimeout { .. }));
        assert_eq!(err.phase(), Phase::Probing);
        assert_eq!(coordinator.history(), &[Phase::NotStarted, Phase::Probing]);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failures_is_insufficient_data() {
        let mut coordinator = Coordinator::new(
            config(Duration::from_millis(50), 2),
            AlwaysFails,
            watchful(),
            Up,
            ProcessHandle::current(),
        );

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, Error::InsufficientData));
        assert_eq!(coordinator.phase(), Phase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_only_once() {
        let mut coordinator = Coordinator::new(
            config(Duration::from_millis(200), 1),
            FixedLatency(Duration::from_millis(10)),
            watchful(),
            Up,
            ProcessHandle::current(),
        );

        coordinator.run().await.unwrap();
        assert!(matches!(coordinator.run().await, Err(Error::AlreadyStarted)));
    }

    #[tokio::test]
    async fn invalid_config_never_probes() {
        let mut coordinator = Coordinator::new(
            config(Duration::ZERO, 1),
            FixedLatency(Duration::from_millis(10)),
            watchful(),
            Down,
            ProcessHandle::current(),
        );

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(coordinator.phase(), Phase::NotStarted);
    }
}
