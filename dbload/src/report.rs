//! Persisting run results
//!
//! Kept apart from the run itself: nothing in the coordination path touches the filesystem.
//! A report is a `resource_usage.csv` time series plus a `summary.json` written side by side.
use dbload_core::RunResult;
use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
#[allow(unused)]
use tracing::{debug, info};

pub const RESOURCE_CSV: &str = "resource_usage.csv";
pub const SUMMARY_JSON: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error writing report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error writing CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Error writing JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Error formatting timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

#[derive(Debug, Serialize)]
struct ResourceRow {
    timestamp: String,
    elapsed_seconds: f64,
    cpu_percent: f64,
    rss_mb: f64,
}

#[serde_as]
#[derive(Debug, Serialize)]
struct LatencySummary {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    mean: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    p95: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    p99: Duration,
}

/// The structured summary of a run, as written to `summary.json`.
#[derive(Debug, Serialize)]
pub struct Summary {
    deployment_seconds: f64,
    duration_seconds: f64,
    concurrency: usize,
    total_requests: u64,
    failed_requests: u64,
    throughput_rps: f64,
    latency_seconds: LatencySummary,
    resource_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    mean_cpu_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_rss_mb: Option<f64>,
    resource_csv: String,
}

impl Summary {
    pub fn new(result: &RunResult, resource_csv: &str) -> Self {
        Self {
            deployment_seconds: result.deployment.as_secs_f64(),
            duration_seconds: result.duration.as_secs_f64(),
            concurrency: result.concurrency,
            total_requests: result.total_requests,
            failed_requests: result.failed_requests,
            throughput_rps: result.throughput_rps,
            latency_seconds: LatencySummary {
                mean: result.latency.mean,
                p95: result.latency.p95,
                p99: result.latency.p99,
            },
            resource_samples: result.resource_samples.len(),
            mean_cpu_percent: result.mean_cpu_percent(),
            peak_rss_mb: result.peak_memory_megabytes(),
            resource_csv: resource_csv.to_string(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Paths of a written report.
#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub resource_csv: PathBuf,
    pub summary_json: PathBuf,
}

/// Write `result` into `dir`, creating the directory if needed.
pub fn write_report(result: &RunResult, dir: &Path) -> Result<ReportFiles, ReportError> {
    fs::create_dir_all(dir)?;
    let files = ReportFiles {
        resource_csv: dir.join(RESOURCE_CSV),
        summary_json: dir.join(SUMMARY_JSON),
    };

    let mut writer = csv::Writer::from_path(&files.resource_csv)?;
    for sample in &result.resource_samples {
        writer.serialize(ResourceRow {
            timestamp: sample.timestamp.format(&Rfc3339)?,
            elapsed_seconds: sample.elapsed.as_secs_f64(),
            cpu_percent: sample.cpu_percent,
            rss_mb: sample.memory_megabytes,
        })?;
    }
    writer.flush()?;

    let summary = Summary::new(result, RESOURCE_CSV);
    serde_json::to_writer_pretty(BufWriter::new(File::create(&files.summary_json)?), &summary)?;

    info!(
        "Report written to {} and {}",
        files.resource_csv.display(),
        files.summary_json.display()
    );
    Ok(files)
}
