//! The resource sampler capability and its `sysinfo` implementation.
use dbload_core::{Reading, BYTES_PER_MEGABYTE};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use sysinfo::{Pid, ProcessRefreshKind, System};
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, trace};

/// Identifies the server process whose usage is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    pub fn from_pid(pid: u32) -> Self {
        Self { pid }
    }

    /// The process running this harness.
    pub fn current() -> Self {
        Self::from_pid(std::process::id())
    }

    /// Locate a process by its exact executable name, e.g. `mysqld`.
    ///
    /// When several processes share the name, the lowest pid wins.
    pub fn by_name(name: &str) -> Result<Self, SamplerError> {
        let mut system = System::new();
        system.refresh_processes();
        system
            .processes_by_exact_name(name)
            .map(|process| process.pid().as_u32())
            .min()
            .map(Self::from_pid)
            .ok_or_else(|| SamplerError::NoSuchName(name.to_string()))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.pid)
    }
}

/// Reads a process's CPU and memory usage.
///
/// A failed read costs one sample; the sampling loop logs it and moves on.
pub trait ResourceSampler: Send + 'static {
    fn sample(
        &mut self,
        process: &ProcessHandle,
    ) -> impl Future<Output = Result<Reading, SamplerError>> + Send;
}

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("Process with pid {0} not found")]
    NotFound(u32),

    #[error("No process named `{0}`")]
    NoSuchName(String),

    #[error("Sampler state is poisoned")]
    PoisonData,

    #[error("Sampler read did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl<T> From<PoisonError<T>> for SamplerError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}

/// Samples a process through `sysinfo`.
///
/// CPU usage is computed between two refreshes, so the first reading for a process reports 0%.
/// Reads happen on the blocking pool; the caller's timeout bounds how long a tick waits on one.
#[derive(Clone)]
pub struct SysinfoSampler {
    system: Arc<Mutex<System>>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    async fn sample(&mut self, process: &ProcessHandle) -> Result<Reading, SamplerError> {
        let system = self.system.clone();
        let pid = process.pid();

        tokio::task::spawn_blocking(move || {
            let mut system = system.lock()?;
            let sysinfo_pid = Pid::from_u32(pid);
            if !system.refresh_process_specifics(
                sysinfo_pid,
                ProcessRefreshKind::new().with_cpu().with_memory(),
            ) {
                return Err(SamplerError::NotFound(pid));
            }

            let process = system
                .process(sysinfo_pid)
                .ok_or(SamplerError::NotFound(pid))?;
            let reading = Reading {
                cpu_percent: process.cpu_usage() as f64,
                memory_megabytes: process.memory() as f64 / BYTES_PER_MEGABYTE,
            };
            trace!("pid {pid}: {reading:?}");
            Ok(reading)
        })
        .await?
    }
}
