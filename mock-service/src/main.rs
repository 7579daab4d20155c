use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    PrometheusBuilder::new()
        .with_http_listener("0.0.0.0:8080".parse::<SocketAddr>()?)
        .install()?;

    tokio::spawn(mock_service::qps_measure_task());

    let addr: SocketAddr = "0.0.0.0:3000".parse()?;
    mock_service::run(addr).await?;
    Ok(())
}
