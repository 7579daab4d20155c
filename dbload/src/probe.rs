//! Readiness probing
//!
//! Before any load is generated the target has to accept connections. The prober retries a
//! cheap connectivity check on a fixed backoff until it succeeds or the readiness budget is
//! spent; the time it took is reported as the deployment time of the run.
use crate::error::Error;
use dbload_core::{DEFAULT_PROBE_BACKOFF, DEFAULT_PROBE_TIMEOUT};
use humantime::format_duration;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// A lightweight check that the target accepts connections.
pub trait ConnectivityCheck: Send + Sync {
    /// Attempt one connect/close cycle, giving up after `timeout`.
    fn probe(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

impl<T: ConnectivityCheck + ?Sized> ConnectivityCheck for &T {
    fn probe(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ProbeError>> + Send {
        (**self).probe(endpoint, timeout)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("No response within {}", format_duration(*.0))]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens and immediately closes a TCP connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectivityCheck;

impl ConnectivityCheck for TcpConnectivityCheck {
    async fn probe(&self, endpoint: &str, timeout: Duration) -> Result<(), ProbeError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;
        drop(stream);
        Ok(())
    }
}

pub struct ReadinessProber<C> {
    check: C,
    attempt_timeout: Duration,
    backoff: Duration,
}

impl<C: ConnectivityCheck> ReadinessProber<C> {
    pub fn new(check: C) -> Self {
        Self {
            check,
            attempt_timeout: DEFAULT_PROBE_TIMEOUT,
            backoff: DEFAULT_PROBE_BACKOFF,
        }
    }

    pub fn attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Poll `endpoint` until it accepts a connection, returning how long that took.
    ///
    /// Returns [`Error::ReadinessTimeout`] once `timeout` has elapsed without a success. Every
    /// attempt is bounded by the attempt timeout and the backoff never sleeps past the deadline,
    /// so this returns within `timeout` plus one attempt timeout.
    #[instrument(name = "readiness", skip(self, timeout))]
    pub async fn wait_until_ready(&self, endpoint: &str, timeout: Duration) -> Result<Duration, Error> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let res = match tokio::time::timeout(
                self.attempt_timeout,
                self.check.probe(endpoint, self.attempt_timeout),
            )
            .await
            {
                Ok(res) => res,
                Err(_) => Err(ProbeError::Timeout(self.attempt_timeout)),
            };

            match res {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    info!(
                        "{endpoint} ready after {} ({attempts} attempts)",
                        format_duration(elapsed)
                    );
                    return Ok(elapsed);
                }
                Err(err) => debug!("Attempt {attempts} failed: {err}"),
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("{endpoint} not ready after {attempts} attempts");
                return Err(Error::ReadinessTimeout {
                    endpoint: endpoint.to_string(),
                    waited: now - start,
                    attempts,
                });
            }
            tokio::time::sleep(self.backoff.min(deadline - now)).await;
        }
    }
}

/// Probe `endpoint` over TCP with the default attempt timeout and backoff.
pub async fn wait_until_ready(endpoint: &str, timeout: Duration) -> Result<Duration, Error> {
    ReadinessProber::new(TcpConnectivityCheck)
        .wait_until_ready(endpoint, timeout)
        .await
}
