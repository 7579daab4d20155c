//! Benchmark builder
use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::executor::QueryExecutor;
use crate::probe::{ConnectivityCheck, TcpConnectivityCheck};
use crate::resource::{ProcessHandle, ResourceSampler};
use dbload_core::{RunConfig, RunResult};
use std::{
    future::Future,
    num::{NonZeroU32, NonZeroUsize},
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

/// A configured benchmark run
///
/// Awaiting a `Benchmark` performs the run and resolves to its [`RunResult`].
///
/// # Example
/// ```no_run
/// use dbload::prelude::*;
/// use std::time::Duration;
///
/// # struct Select1;
/// # impl QueryExecutor for Select1 {
/// #     async fn execute(&self) -> Result<(), ExecutorError> { Ok(()) }
/// # }
/// #[tokio::main]
/// async fn main() -> Result<(), dbload::Error> {
///     let result = Benchmark::new(
///         "127.0.0.1:3306",
///         Select1,
///         SysinfoSampler::new(),
///         ProcessHandle::by_name("mysqld").unwrap(),
///     )
///     .duration(Duration::from_secs(30))
///     .concurrency(20)
///     .await?;
///
///     println!("{result}");
///     Ok(())
/// }
/// ```
pub struct Benchmark<E, S, C = TcpConnectivityCheck> {
    coordinator: Option<Coordinator<E, S, C>>,
    runner_fut: Option<Pin<Box<dyn Future<Output = Result<RunResult, Error>> + Send>>>,
}

// Nothing is structurally pinned; the run itself lives in a boxed future.
impl<E, S, C> Unpin for Benchmark<E, S, C> {}

impl<E, S> Benchmark<E, S, TcpConnectivityCheck>
where
    E: QueryExecutor,
    S: ResourceSampler,
{
    /// Benchmark the server at `endpoint` (`host:port`), sampling `process`.
    pub fn new(endpoint: &str, executor: E, sampler: S, process: ProcessHandle) -> Self {
        Self::with_config(
            RunConfig::new(endpoint),
            executor,
            sampler,
            TcpConnectivityCheck,
            process,
        )
    }
}

impl<E, S, C> Benchmark<E, S, C>
where
    E: QueryExecutor,
    S: ResourceSampler,
    C: ConnectivityCheck + 'static,
{
    pub fn with_config(
        config: RunConfig,
        executor: E,
        sampler: S,
        check: C,
        process: ProcessHandle,
    ) -> Self {
        Self {
            coordinator: Some(Coordinator::new(config, executor, sampler, check, process)),
            runner_fut: None,
        }
    }

    /// Length of the loaded window.
    pub fn duration(self, duration: Duration) -> Self {
        self.configure(|config| config.duration = duration)
    }

    /// Number of units of work kept in flight.
    ///
    /// NOTE: Panics when `concurrency` is 0
    pub fn concurrency(self, concurrency: usize) -> Self {
        let concurrency =
            NonZeroUsize::new(concurrency).expect("Concurrency is not allowed to be set to 0.");
        self.configure(|config| config.concurrency = concurrency)
    }

    /// Cadence of resource samples.
    pub fn sample_interval(self, interval: Duration) -> Self {
        self.configure(|config| config.sample_interval = interval)
    }

    /// How long the target may take to accept connections.
    pub fn readiness_timeout(self, timeout: Duration) -> Self {
        self.configure(|config| config.readiness_timeout = timeout)
    }

    /// Units running longer than `timeout` are counted as failed. `None` waits forever.
    pub fn request_timeout(self, timeout: Option<Duration>) -> Self {
        self.configure(|config| config.request_timeout = timeout)
    }

    /// Cap the dispatch rate across all workers.
    pub fn rate_limit(self, limit: NonZeroU32) -> Self {
        self.configure(|config| config.rate_limit = Some(limit))
    }

    pub fn config(&self) -> Option<&RunConfig> {
        self.coordinator.as_ref().map(Coordinator::config)
    }

    fn configure(mut self, f: impl FnOnce(&mut RunConfig)) -> Self {
        if let Some(coordinator) = &mut self.coordinator {
            f(coordinator.config_mut());
        }
        self
    }
}

impl<E, S, C> Future for Benchmark<E, S, C>
where
    E: QueryExecutor,
    S: ResourceSampler,
    C: ConnectivityCheck + 'static,
{
    type Output = Result<RunResult, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let Some(mut coordinator) = self.coordinator.take() else {
                return Poll::Ready(Err(Error::AlreadyStarted));
            };
            self.runner_fut = Some(Box::pin(async move { coordinator.run().await }));
        }

        if let Some(runner) = &mut self.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}
