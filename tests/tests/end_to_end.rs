mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use dbload::prelude::*;
    use dbload::report::write_report;
    use dbload::{Error, Phase};
    use std::num::NonZeroU32;
    use std::time::Duration;

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn http_benchmark_against_mock_service() {
        init().await;

        let executor = HttpQueryExecutor::new(&url("/query/delay/ms/10"), "SELECT 1");
        let result = Benchmark::new(
            MOCK_ADDR,
            executor,
            SysinfoSampler::new(),
            ProcessHandle::current(),
        )
        .duration(Duration::from_secs(3))
        .concurrency(4)
        .sample_interval(Duration::from_millis(500))
        .await
        .unwrap();

        assert_eq!(result.failed_requests, 0);
        // 4 workers over 3s at a little over 10ms each.
        assert!(dbg!(result.total_requests) > 400);
        assert!(result.total_requests <= 1_200);
        assert!(dbg!(result.latency.p95) >= Duration::from_millis(10));
        assert!(result.latency.mean <= result.latency.p99);
        assert!(dbg!(result.resource_samples.len()) >= 5);
        assert!(result.peak_memory_megabytes().unwrap() > 0.);

        let dir = tempfile::tempdir().unwrap();
        let files = write_report(&result, dir.path()).unwrap();
        let csv = std::fs::read_to_string(files.resource_csv).unwrap();
        assert_eq!(csv.lines().count(), result.resource_samples.len() + 1);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn rejected_queries_are_counted_not_measured() {
        init().await;

        let executor = HttpQueryExecutor::new(
            &url("/limited/50/delay/ms/1/server/rejected_queries"),
            "SELECT 1",
        );
        let result = Benchmark::new(
            MOCK_ADDR,
            executor,
            SysinfoSampler::new(),
            ProcessHandle::current(),
        )
        .duration(Duration::from_secs(2))
        .concurrency(8)
        .await
        .unwrap();

        assert!(dbg!(result.failed_requests) > 0);
        assert!(result.successful_requests() <= 150);
        assert!(result.error_rate() > 0.5);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn rate_limit_caps_dispatch() {
        init().await;

        let executor = HttpQueryExecutor::new(&url("/query/delay/ms/1"), "SELECT 1");
        let result = Benchmark::new(
            MOCK_ADDR,
            executor,
            SysinfoSampler::new(),
            ProcessHandle::current(),
        )
        .duration(Duration::from_secs(2))
        .concurrency(10)
        .rate_limit(NonZeroU32::new(100).unwrap())
        .await
        .unwrap();

        assert!(dbg!(result.throughput_rps) <= 110.);
        assert!(result.throughput_rps >= 80.);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn unreachable_server_never_loads() {
        init().await;

        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let executor = HttpQueryExecutor::new(&format!("http://{addr}/"), "SELECT 1");
        let err = Benchmark::new(&addr, executor, SysinfoSampler::new(), ProcessHandle::current())
            .readiness_timeout(Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ReadinessTimeout { .. }));
        assert_eq!(err.phase(), Phase::Probing);
    }
}
