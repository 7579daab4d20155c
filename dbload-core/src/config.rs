use crate::{
    DEFAULT_CONCURRENCY, DEFAULT_DATABASE, DEFAULT_DURATION, DEFAULT_PORT, DEFAULT_PROBE_BACKOFF,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_READINESS_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SAMPLE_INTERVAL, DEFAULT_USER, DEFAULT_WORKLOAD,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;
use thiserror::Error;

/// Parameters of a single benchmark run.
///
/// Built once from external input and never mutated while the run is active. Every duration
/// (de)serializes as fractional seconds.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// `host:port` of the database server, used for readiness probing.
    pub endpoint: String,
    pub user: String,
    /// Never serialized, so a dumped config does not leak it.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
    /// Workload issued by each unit of work (usually a SQL statement).
    pub workload: String,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub concurrency: NonZeroUsize,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub sample_interval: Duration,
    /// Per-read bound for the resource sampler. Defaults to the sample interval.
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub sample_timeout: Option<Duration>,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub readiness_timeout: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub probe_timeout: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub probe_backoff: Duration,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub request_timeout: Option<Duration>,
    /// Optional cap on dispatched units per second, shared by all workers.
    pub rate_limit: Option<NonZeroU32>,
}

impl RunConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    /// Split the endpoint into host and port, defaulting the port to 3306.
    ///
    /// Bracketed IPv6 hosts (`[::1]:3306`) are unwrapped.
    pub fn host_port(&self) -> Result<(&str, u16), ConfigError> {
        let endpoint = self.endpoint.as_str();
        let invalid = || ConfigError::InvalidEndpoint(endpoint.to_string());

        let (host, port) = match endpoint.rsplit_once(':') {
            Some((host, port)) if !host.ends_with(':') => {
                (host, port.parse::<u16>().map_err(|_| invalid())?)
            }
            _ => (endpoint, DEFAULT_PORT),
        };
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(invalid());
        }
        Ok((host, port))
    }

    pub fn sample_timeout(&self) -> Duration {
        self.sample_timeout.unwrap_or(self.sample_interval)
    }

    /// Reject configurations no run can honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        self.host_port()?;

        let durations = [
            ("duration", Some(self.duration)),
            ("sample_interval", Some(self.sample_interval)),
            ("sample_timeout", self.sample_timeout),
            ("probe_timeout", Some(self.probe_timeout)),
            ("request_timeout", self.request_timeout),
        ];
        for (field, value) in durations {
            if value.is_some_and(|d| d.is_zero()) {
                return Err(ConfigError::ZeroDuration(field));
            }
        }

        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            user: DEFAULT_USER.to_string(),
            password: None,
            database: Some(DEFAULT_DATABASE.to_string()),
            workload: DEFAULT_WORKLOAD.to_string(),
            duration: DEFAULT_DURATION,
            concurrency: DEFAULT_CONCURRENCY,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            sample_timeout: None,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_backoff: DEFAULT_PROBE_BACKOFF,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            rate_limit: None,
        }
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "endpoint={}, user={}, duration={}, concurrency={}, interval={}",
            self.endpoint,
            self.user,
            humantime::format_duration(self.duration),
            self.concurrency,
            humantime::format_duration(self.sample_interval),
        )?;
        if let Some(limit) = self.rate_limit {
            write!(f, ", rate_limit={limit}/s")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No endpoint configured")]
    MissingEndpoint,

    #[error("Endpoint `{0}` is not `host:port`")]
    InvalidEndpoint(String),

    #[error("`{0}` must be greater than zero")]
    ZeroDuration(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::new("127.0.0.1:3306");
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.sample_timeout(), DEFAULT_SAMPLE_INTERVAL);
        assert_eq!(config.workload, "SELECT 1");
    }

    #[test]
    fn zero_duration_is_rejected() {
        let config = RunConfig {
            duration: Duration::ZERO,
            ..RunConfig::new("127.0.0.1:3306")
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroDuration("duration")));

        let config = RunConfig {
            sample_interval: Duration::ZERO,
            ..RunConfig::new("127.0.0.1:3306")
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("sample_interval"))
        );
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        assert_eq!(
            RunConfig::default().validate(),
            Err(ConfigError::MissingEndpoint)
        );
    }

    #[test]
    fn endpoint_splits_into_host_and_port() {
        assert_eq!(RunConfig::new("db:3307").host_port(), Ok(("db", 3307)));
        assert_eq!(RunConfig::new("db").host_port(), Ok(("db", 3306)));
        assert_eq!(RunConfig::new("[::1]:3306").host_port(), Ok(("::1", 3306)));
        assert_eq!(
            RunConfig::new("db:mysql").validate(),
            Err(ConfigError::InvalidEndpoint("db:mysql".to_string()))
        );
        assert_eq!(
            RunConfig::new(":3306").validate(),
            Err(ConfigError::InvalidEndpoint(":3306".to_string()))
        );
    }

    #[test]
    fn password_is_never_serialized() {
        let config = RunConfig {
            password: Some("hunter2".to_string()),
            ..RunConfig::new("db:3306")
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!config.to_string().contains("hunter2"));

        let config: RunConfig =
            serde_json::from_str(r#"{"endpoint": "db:3306", "password": "secret"}"#).unwrap();
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.user, "benchmark");
        assert_eq!(config.database.as_deref(), Some("benchmark_db"));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"endpoint": "db:3306", "duration": 2.5, "concurrency": 5}"#)
                .unwrap();
        assert_eq!(config.duration, Duration::from_millis(2_500));
        assert_eq!(config.concurrency.get(), 5);
        assert_eq!(config.sample_interval, DEFAULT_SAMPLE_INTERVAL);
        assert_eq!(config.request_timeout, Some(DEFAULT_REQUEST_TIMEOUT));
    }
}
