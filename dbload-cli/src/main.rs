use anyhow::{Context, Result};
use clap::Parser;
use dbload::prelude::*;
use dbload::report::{write_report, Summary, RESOURCE_CSV};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Benchmark a running database server.
///
/// Queries go to MySQL at `--endpoint` unless `--url` selects an HTTP query interface.
#[derive(Parser, Debug)]
#[command(name = "dbload", version = "0.1")]
struct Cli {
    /// `host:port` probed for readiness and, without `--url`, connected to over MySQL.
    #[arg(short, long)]
    endpoint: String,

    #[arg(long)]
    user: Option<String>,

    #[arg(long, env = "DBLOAD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long)]
    database: Option<String>,

    /// POST the workload to this HTTP query URL instead of using MySQL.
    #[arg(short, long)]
    url: Option<String>,

    /// Workload sent by every unit of work.
    #[arg(short, long)]
    query: Option<String>,

    /// Base configuration as JSON; flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    #[arg(short, long)]
    concurrency: Option<NonZeroUsize>,

    #[arg(long, value_parser = humantime::parse_duration)]
    sample_interval: Option<Duration>,

    #[arg(long, value_parser = humantime::parse_duration)]
    readiness_timeout: Option<Duration>,

    /// Per-query timeout such as `5s`, or `off` to wait forever.
    #[arg(long, value_parser = parse_request_timeout)]
    request_timeout: Option<RequestTimeout>,

    /// Maximum queries per second across all workers.
    #[arg(long)]
    rate_limit: Option<NonZeroU32>,

    /// Pid of the server process to sample. Takes precedence over `--process-name`.
    #[arg(long)]
    pid: Option<u32>,

    #[arg(long, default_value = "mysqld")]
    process_name: String,

    /// Directory the CSV time series and JSON summary are written to.
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Expose live metrics for Prometheus on this address.
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RequestTimeout(Option<Duration>);

fn parse_request_timeout(s: &str) -> Result<RequestTimeout, humantime::DurationError> {
    match s {
        "off" | "none" => Ok(RequestTimeout(None)),
        _ => humantime::parse_duration(s).map(|d| RequestTimeout(Some(d))),
    }
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
            }
            None => RunConfig::default(),
        };

        config.endpoint = self.endpoint.clone();
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(database) = &self.database {
            config.database = Some(database.clone());
        }
        if let Some(query) = &self.query {
            config.workload = query.clone();
        }
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(interval) = self.sample_interval {
            config.sample_interval = interval;
        }
        if let Some(timeout) = self.readiness_timeout {
            config.readiness_timeout = timeout;
        }
        if let Some(RequestTimeout(timeout)) = self.request_timeout {
            config.request_timeout = timeout;
        }
        if let Some(limit) = self.rate_limit {
            config.rate_limit = Some(limit);
        }
        Ok(config)
    }

    fn process(&self) -> Result<ProcessHandle> {
        match self.pid {
            Some(pid) => Ok(ProcessHandle::from_pid(pid)),
            None => ProcessHandle::by_name(&self.process_name)
                .with_context(|| format!("locating the `{}` process", self.process_name)),
        }
    }
}

async fn benchmark<E: QueryExecutor>(
    config: RunConfig,
    executor: E,
    process: ProcessHandle,
) -> Result<RunResult> {
    let result = Benchmark::with_config(
        config,
        executor,
        SysinfoSampler::new(),
        TcpConnectivityCheck,
        process,
    )
    .await?;
    Ok(result)
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dbload=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing the Prometheus exporter")?;
    }

    let config = cli.run_config()?;
    let process = cli.process()?;

    let result = match &cli.url {
        Some(url) => {
            info!("Sampling {process}, posting queries to {url}");
            let executor = HttpQueryExecutor::new(url, &config.workload);
            benchmark(config, executor, process).await?
        }
        None => {
            info!("Sampling {process}, querying MySQL at {}", config.endpoint);
            let executor = MySqlQueryExecutor::from_config(&config)?;
            benchmark(config, executor, process).await?
        }
    };

    println!("{result}");
    println!("{}", Summary::new(&result, RESOURCE_CSV).to_json_pretty()?);

    let files = write_report(&result, &cli.output)?;
    info!("Wrote {}", files.summary_json.display());
    Ok(())
}
