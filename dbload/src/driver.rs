//! Load driver
//!
//! Keeps a fixed number of units of work in flight until a deadline, then drains. The driver is
//! the single collector of unit outcomes: workers run as spawned tasks in a [`JoinSet`] and the
//! driver appends each result as it is joined, so completion order is append order.
use crate::executor::{ExecutorError, QueryExecutor};
use crate::unit::{run_unit, UnitHook};
use humantime::format_duration;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Everything the load phase produced.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Latency of every successful unit, in completion order.
    pub measurements: Vec<Duration>,
    pub failed: u64,
    pub total_dispatched: u64,
    /// Wall time from first dispatch until the last unit drained.
    pub elapsed: Duration,
}

impl LoadOutcome {
    /// Units that have been dispatched but not yet accounted for.
    ///
    /// Always zero once the driver has returned.
    pub fn outstanding(&self) -> u64 {
        self.total_dispatched - self.measurements.len() as u64 - self.failed
    }

    fn record(&mut self, res: Result<Result<Duration, ExecutorError>, tokio::task::JoinError>) {
        match res {
            Ok(Ok(latency)) => self.measurements.push(latency),
            Ok(Err(err)) => {
                debug!("Unit of work failed: {err}");
                self.failed += 1;
            }
            Err(err) => {
                error!("Unit of work did not complete: {err}");
                self.failed += 1;
            }
        }
    }
}

pub struct LoadDriver<E> {
    executor: Arc<E>,
    concurrency: NonZeroUsize,
    hook: UnitHook,
}

impl<E: QueryExecutor> LoadDriver<E> {
    pub fn new(executor: Arc<E>, concurrency: NonZeroUsize) -> Self {
        Self {
            executor,
            concurrency,
            hook: UnitHook::default(),
        }
    }

    /// Fail any unit still running after `timeout`.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.hook.request_timeout = timeout;
        self
    }

    /// Share a requests/sec cap across all workers.
    pub fn rate_limit(mut self, limit: Option<NonZeroU32>) -> Self {
        self.hook = UnitHook::new(limit, self.hook.request_timeout);
        self
    }

    /// Run load for `duration` starting now.
    pub async fn run(&self, duration: Duration) -> LoadOutcome {
        self.run_until(Instant::now() + duration).await
    }

    /// Keep `concurrency` units in flight until `deadline`, then wait for every outstanding unit.
    ///
    /// The initial batch is always dispatched, so at least one unit runs even when the deadline
    /// has already passed.
    #[instrument(name = "load", skip_all, fields(concurrency = self.concurrency.get()))]
    pub async fn run_until(&self, deadline: Instant) -> LoadOutcome {
        let start = Instant::now();
        let mut outcome = LoadOutcome::default();
        let mut tasks = JoinSet::new();

        for _ in 0..self.concurrency.get() {
            self.dispatch(&mut tasks);
            outcome.total_dispatched += 1;
        }
        trace!("Dispatched initial batch of {}", self.concurrency);

        let mut draining = false;
        while let Some(res) = tasks.join_next().await {
            outcome.record(res);

            if !draining && Instant::now() < deadline {
                self.dispatch(&mut tasks);
                outcome.total_dispatched += 1;
            } else if !draining {
                draining = true;
                debug!(
                    "Deadline reached after {}, draining {} in-flight units",
                    format_duration(start.elapsed()),
                    tasks.len()
                );
            }
        }

        outcome.elapsed = start.elapsed();
        debug_assert_eq!(outcome.outstanding(), 0);
        info!(
            "Load drained: {} dispatched, {} failed, {}",
            outcome.total_dispatched,
            outcome.failed,
            format_duration(outcome.elapsed)
        );

        outcome
    }

    fn dispatch(&self, tasks: &mut JoinSet<Result<Duration, ExecutorError>>) {
        let executor = self.executor.clone();
        let hook = self.hook.clone();
        tasks.spawn(run_unit(executor, hook));
    }
}

/// Drive `executor` at `concurrency` for `duration` with no timeout or rate limit.
pub async fn run_load<E: QueryExecutor>(
    duration: Duration,
    concurrency: NonZeroUsize,
    executor: Arc<E>,
) -> LoadOutcome {
    LoadDriver::new(executor, concurrency)
        .request_timeout(None)
        .run(duration)
        .await
}
