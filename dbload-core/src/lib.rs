//! Types shared between the dbload engine, its reporting collaborator and the CLI.
mod config;
mod constants;
mod data;
mod metrics;
mod stats;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use metrics::*;
pub use stats::*;
