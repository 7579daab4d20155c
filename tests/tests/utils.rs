use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

pub const MOCK_ADDR: &str = "127.0.0.1:3002";

#[allow(unused)]
pub fn url(path: &str) -> String {
    format!("http://{MOCK_ADDR}{path}")
}

/// Install logging and metrics, and start the mock query service once per test binary.
///
/// The service gets its own thread and runtime so it outlives each test's runtime.
#[allow(unused)]
pub async fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    let wait = ONCE_LOCK.get().is_none();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("dbload=debug,mock_service=info")
            .init();

        std::thread::spawn(|| {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                PrometheusBuilder::new()
                    .with_http_listener("127.0.0.1:8002".parse::<SocketAddr>().unwrap())
                    .install()
                    .unwrap();

                let addr: SocketAddr = MOCK_ADDR.parse().unwrap();
                mock_service::run(addr).await.unwrap();
            });
        });
    });

    if wait {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
