use super::{ExecutorError, QueryExecutor};
use reqwest::Client;
#[allow(unused)]
use tracing::{debug, trace};

/// Sends the workload as the body of a POST to an HTTP query endpoint.
///
/// Suitable for databases that expose queries over HTTP (ClickHouse's `:8123` interface, for
/// instance). Any non-2xx status counts as a failed request.
#[derive(Clone, Debug)]
pub struct HttpQueryExecutor {
    client: Client,
    url: String,
    workload: String,
}

impl HttpQueryExecutor {
    pub fn new(url: &str, workload: &str) -> Self {
        Self::with_client(Client::new(), url, workload)
    }

    pub fn with_client(client: Client, url: &str, workload: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            workload: workload.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self) -> Result<(), ExecutorError> {
        let res = self
            .client
            .post(&self.url)
            .body(self.workload.clone())
            .send()
            .await?;

        let status = res.status();
        // Drain the body so the round trip includes the full result set.
        let body = res.bytes().await?;
        trace!("{status} with {} bytes", body.len());

        if status.is_success() {
            Ok(())
        } else {
            Err(ExecutorError::Rejected(status.to_string()))
        }
    }
}
