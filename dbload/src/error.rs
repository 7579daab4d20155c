use crate::coordinator::Phase;
use dbload_core::ConfigError;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;

/// Conditions that abort a whole run. Per-request and per-sample failures never surface here;
/// they are counted or skipped where they occur.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("{endpoint} was not ready after {} ({attempts} attempts)", humantime::format_duration(*.waited))]
    ReadinessTimeout {
        endpoint: String,
        waited: Duration,
        attempts: u32,
    },

    #[error("No successful measurements were collected")]
    InsufficientData,

    #[error("Sampling task ended unexpectedly: {0}")]
    SamplingAborted(#[from] JoinError),

    #[error("Benchmark has already been started")]
    AlreadyStarted,
}

impl Error {
    /// The phase the run was in when it failed.
    pub fn phase(&self) -> Phase {
        match self {
            Error::InvalidConfig(_) | Error::AlreadyStarted => Phase::NotStarted,
            Error::ReadinessTimeout { .. } => Phase::Probing,
            Error::SamplingAborted(_) => Phase::Draining,
            Error::InsufficientData => Phase::Stopped,
        }
    }
}
