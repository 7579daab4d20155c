use super::{ExecutorError, QueryExecutor};
use dbload_core::{ConfigError, RunConfig};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Connection};
#[allow(unused)]
use tracing::{debug, trace};

/// Runs the workload against MySQL over a fresh connection per unit of work.
///
/// Each call connects, executes the workload, fetches every row and closes the connection, so
/// the measured latency includes the connection handshake.
#[derive(Clone, Debug)]
pub struct MySqlQueryExecutor {
    options: MySqlConnectOptions,
    workload: String,
}

impl MySqlQueryExecutor {
    pub fn new(options: MySqlConnectOptions, workload: &str) -> Self {
        Self {
            options,
            workload: workload.to_string(),
        }
    }

    /// Connect to the run's endpoint with its user, password and database.
    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        let (host, port) = config.host_port()?;
        let mut options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&config.user);
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }
        Ok(Self::new(options, &config.workload))
    }
}

impl QueryExecutor for MySqlQueryExecutor {
    async fn execute(&self) -> Result<(), ExecutorError> {
        let mut conn = self.options.connect().await?;
        let rows = sqlx::query(self.workload.as_str())
            .fetch_all(&mut conn)
            .await?;
        trace!("{} rows", rows.len());
        conn.close().await?;
        Ok(())
    }
}
