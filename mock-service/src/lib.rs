//! A stand-in for a database's query endpoint.
//!
//! Every route accepts a POSTed query body, sleeps for the requested delay and answers with a
//! single-row result. The `limited` route additionally rejects queries above a fixed rate with a
//! 500, which is how tests exercise failure accounting.
use axum::{debug_handler, extract::Path, http::StatusCode, routing::post, Router};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub fn router() -> Router {
    Router::new()
        .route("/query/delay/ms/:delay_ms", post(query))
        .route(
            "/limited/:max_qps/delay/ms/:delay_ms/server/:server_id",
            post(limited),
        )
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router()).await
}

const ROW: &str = "1";

#[debug_handler]
pub async fn query(Path(delay_ms): Path<u64>, body: String) -> &'static str {
    counter!("mock-service.queries").increment(1);
    QPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    debug!("query: {body}");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    ROW
}

lazy_static! {
    static ref LIMITED_MAP: RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>> =
        RwLock::new(HashMap::new());
}

#[debug_handler]
pub async fn limited(
    Path((max_qps, delay_ms, server_id)): Path<(u32, u64, String)>,
) -> Result<&'static str, StatusCode> {
    QPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let limiter = limiter_for(&server_id, max_qps)?;
    match limiter.check() {
        Ok(_) => Ok(ROW),
        Err(_) => {
            counter!("mock-service.rejected").increment(1);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn limiter_for(server_id: &str, max_qps: u32) -> Result<Arc<DefaultDirectRateLimiter>, StatusCode> {
    let max_qps = NonZeroU32::new(max_qps).ok_or(StatusCode::BAD_REQUEST)?;

    let read = LIMITED_MAP
        .read()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .get(server_id)
        .cloned();
    if let Some(limiter) = read {
        return Ok(limiter);
    }

    let mut map = LIMITED_MAP
        .write()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let limiter = map
        .entry(server_id.to_string())
        .or_insert_with(|| Arc::new(rate_limiter(max_qps)))
        .clone();
    Ok(limiter)
}

/** Utils **/

pub fn rate_limiter(qps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(qps))
}

/** QPS Printer **/

static QPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn qps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let queries = QPS_MEASURE.swap(0, Ordering::Relaxed);
        gauge!("mock-service.qps").set(queries as f64);
        println!("{queries} QPS");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn post(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::from("SELECT 1")).unwrap()
    }

    #[tokio::test]
    async fn query_answers_a_row() {
        let res = router().oneshot(post("/query/delay/ms/1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn limited_rejects_over_the_rate() {
        let app = router();
        let mut statuses = vec![];
        for _ in 0..5 {
            let res = app
                .clone()
                .oneshot(post("/limited/1/delay/ms/0/server/unit-test"))
                .await
                .unwrap();
            statuses.push(res.status());
        }

        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses[1..]
            .iter()
            .all(|s| *s == StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn zero_rate_is_a_bad_request() {
        let res = router()
            .oneshot(post("/limited/0/delay/ms/0/server/zero"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
