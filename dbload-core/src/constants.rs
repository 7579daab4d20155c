use std::num::NonZeroUsize;
use std::time::Duration;

/// Default number of units of work kept in flight.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(20) };

/// Default length of the loaded window.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);

/// Default cadence of the resource sampling loop.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// How long to wait for the target to accept connections before giving up.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(120);

/// Bound on a single readiness attempt, distinct from the overall deadline.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause between failed readiness attempts.
pub const DEFAULT_PROBE_BACKOFF: Duration = Duration::from_secs(1);

/// A unit of work running longer than this is recorded as failed.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default account and schema for SQL executors.
pub const DEFAULT_USER: &str = "benchmark";
pub const DEFAULT_DATABASE: &str = "benchmark_db";

/// Port assumed when the endpoint names only a host.
pub const DEFAULT_PORT: u16 = 3306;

/// Default workload issued by each unit of work.
pub const DEFAULT_WORKLOAD: &str = "SELECT 1";

pub const BYTES_PER_MEGABYTE: f64 = 1024. * 1024.;
