//! The query executor capability
//!
//! A [`QueryExecutor`] issues one workload-defined request against the target. The harness owns
//! the timing, timeouts and rate limiting around each call; an executor only has to report
//! whether the request succeeded.
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub mod http;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

/// One request/response cycle against the database under test.
///
/// Implementations are shared by every concurrent worker, so `execute` takes `&self`.
///
/// # Example
/// ```no_run
/// use dbload::executor::{ExecutorError, QueryExecutor};
///
/// struct Noop;
///
/// impl QueryExecutor for Noop {
///     async fn execute(&self) -> Result<(), ExecutorError> {
///         Ok(())
///     }
/// }
/// ```
pub trait QueryExecutor: Send + Sync + 'static {
    fn execute(&self) -> impl Future<Output = Result<(), ExecutorError>> + Send;
}

/// Failure of a single unit of work. Recorded as a failed outcome; never aborts a run.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Request did not complete within {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Target rejected the request: {0}")]
    Rejected(String),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "mysql")]
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}
