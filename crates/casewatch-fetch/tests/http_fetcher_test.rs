//! HttpFetcher integration tests against an in-process axum backend.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use casewatch_core::{Resource, ResourceKey, ResourceValue};
use casewatch_fetch::{FetchError, Fetcher, HttpFetcher};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

async fn cases(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let limit: usize = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(3);
    let body: Vec<serde_json::Value> = (1..=limit as i64)
        .map(|id| serde_json::json!({"id": id, "title": format!("Case {id}"), "status": "active"}))
        .collect();
    axum::Json(body)
}

async fn start_backend() -> SocketAddr {
    let app = Router::new()
        .route("/api/cases", get(cases))
        .route(
            "/api/dashboard",
            get(|| async { axum::Json(serde_json::json!({"total_cases": 4, "active_jobs": 1})) }),
        )
        .route(
            "/api/threats/recent",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        )
        .route("/api/ai-jobs", get(|| async { "{not json" }))
        .route(
            "/api/evidence",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "[]"
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fetcher_for(addr: SocketAddr, timeout: Duration) -> HttpFetcher {
    HttpFetcher::new(format!("http://{addr}"), timeout).unwrap()
}

#[tokio::test]
async fn test_fetch_decodes_list_with_query_params() {
    let addr = start_backend().await;
    let fetcher = fetcher_for(addr, Duration::from_secs(2));

    let key = ResourceKey::cases().with_param("limit", 2);
    let value = fetcher.fetch(&key).await.unwrap();

    let cases = value.as_cases().expect("cases variant");
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[1].title, "Case 2");
}

#[tokio::test]
async fn test_fetch_decodes_dashboard_summary() {
    let addr = start_backend().await;
    let fetcher = fetcher_for(addr, Duration::from_secs(2));

    let value = fetcher.fetch(&ResourceKey::dashboard()).await.unwrap();
    match value {
        ResourceValue::Dashboard(summary) => {
            assert_eq!(summary.total_cases, 4);
            assert_eq!(summary.active_jobs, 1);
        }
        other => panic!("unexpected variant: {:?}", other.resource()),
    }
}

#[tokio::test]
async fn test_non_success_status_is_http_error() {
    let addr = start_backend().await;
    let fetcher = fetcher_for(addr, Duration::from_secs(2));

    let err = fetcher.fetch(&ResourceKey::threats()).await.unwrap_err();
    assert_eq!(err, FetchError::Http { status: 503 });
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let addr = start_backend().await;
    let fetcher = fetcher_for(addr, Duration::from_secs(2));

    let err = fetcher.fetch(&ResourceKey::ai_jobs()).await.unwrap_err();
    assert_eq!(err.kind(), "parse");
}

#[tokio::test]
async fn test_unrouted_path_is_http_404() {
    let addr = start_backend().await;
    let fetcher = fetcher_for(addr, Duration::from_secs(2));

    let err = fetcher
        .fetch(&ResourceKey::new(Resource::Notifications))
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Http { status: 404 });
    assert!(err.is_permanent_client_error());
}

#[tokio::test]
async fn test_slow_endpoint_times_out_as_network_error() {
    let addr = start_backend().await;
    let fetcher = fetcher_for(addr, Duration::from_millis(200));

    let err = fetcher.fetch(&ResourceKey::evidence()).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = fetcher_for(addr, Duration::from_secs(2));
    let err = fetcher.fetch(&ResourceKey::cases()).await.unwrap_err();
    assert_eq!(err.kind(), "network");
}
