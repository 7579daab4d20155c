//! Execution of a single unit of work.
use crate::executor::{ExecutorError, QueryExecutor};
#[cfg(feature = "metrics")]
use dbload_core::DEFAULT_LABELS;
use governor::DefaultDirectRateLimiter;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Latency of a successful unit, or why it failed.
pub(crate) type UnitOutcome = Result<Duration, ExecutorError>;

/// Everything a worker needs besides the executor itself.
#[derive(Clone, Default)]
pub(crate) struct UnitHook {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub request_timeout: Option<Duration>,
}

impl UnitHook {
    pub fn new(rate_limit: Option<NonZeroU32>, request_timeout: Option<Duration>) -> Self {
        Self {
            limiter: rate_limit.map(|limit| Arc::new(rate_limiter(limit))),
            request_timeout,
        }
    }
}

/// Wait for the rate limiter (if any), then time one call to the executor.
///
/// Time spent waiting on the limiter is not part of the latency.
pub(crate) async fn run_unit<E: QueryExecutor>(executor: Arc<E>, hook: UnitHook) -> UnitOutcome {
    if let Some(limiter) = &hook.limiter {
        limiter.until_ready().await;
    }

    let start = Instant::now();
    let res = match hook.request_timeout {
        Some(limit) => match tokio::time::timeout(limit, executor.execute()).await {
            Ok(res) => res,
            Err(_) => Err(ExecutorError::Timeout(limit)),
        },
        None => executor.execute().await,
    };
    let elapsed = start.elapsed();

    #[cfg(feature = "metrics")]
    {
        metrics::histogram!(DEFAULT_LABELS.latency).record(elapsed.as_secs_f64());
        match &res {
            Ok(()) => metrics::counter!(DEFAULT_LABELS.success).increment(1),
            Err(_) => metrics::counter!(DEFAULT_LABELS.error).increment(1),
        }
    }

    res.map(|()| elapsed)
}

fn rate_limiter(limit: NonZeroU32) -> DefaultDirectRateLimiter {
    use governor::{Quota, RateLimiter};
    RateLimiter::direct(Quota::per_second(limit).allow_burst(NonZeroU32::MIN))
}
