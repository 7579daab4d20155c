#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod benchmark;
pub mod coordinator;
pub mod driver;
pub mod executor;
pub mod probe;
pub mod report;
pub mod resource;
pub mod sampling;

mod error;
pub(crate) mod unit;

pub use benchmark::Benchmark;
pub use coordinator::{Coordinator, Phase};
pub use error::Error;

pub use dbload_core as core;
pub use dbload_core::{LatencyStats, Reading, ResourceSample, RunConfig, RunResult};

pub mod prelude {
    pub use crate::benchmark::Benchmark;
    pub use crate::executor::{ExecutorError, QueryExecutor};
    pub use crate::probe::{ConnectivityCheck, TcpConnectivityCheck};
    pub use crate::resource::{ProcessHandle, ResourceSampler, SysinfoSampler};

    #[cfg(feature = "http")]
    pub use crate::executor::http::HttpQueryExecutor;
    #[cfg(feature = "mysql")]
    pub use crate::executor::mysql::MySqlQueryExecutor;

    pub use dbload_core::{RunConfig, RunResult};
}
