//! Application wiring against an in-process backend.

use axum::routing::get;
use axum::Router;
use casewatch::app::OutputFormat;
use casewatch::{AppConfig, Application};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn start_backend() -> SocketAddr {
    let app = Router::new()
        .route(
            "/api/dashboard",
            get(|| async { axum::Json(json!({"total_cases": 2, "active_cases": 1})) }),
        )
        .route(
            "/api/cases",
            get(|| async { axum::Json(json!([{"id": 11, "title": "Ransomware triage"}])) }),
        )
        .route(
            "/api/threats/recent",
            get(|| async {
                axum::Json(json!([
                    {"id": 1, "threat_type": "beacon", "severity": "low"},
                    {"id": 2, "threat_type": "dropper", "severity": "critical"}
                ]))
            }),
        )
        .route("/api/ai-jobs", get(|| async { axum::Json(json!([])) }))
        .route("/api/evidence", get(|| async { axum::Json(json!([])) }))
        .route("/api/notifications", get(|| async { axum::Json(json!([])) }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(base_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.backend.base_url = base_url;
    config.backend.request_timeout_ms = 2_000;
    config
}

fn widget<'a>(frame: &'a Value, id: &str) -> &'a Value {
    frame["widgets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|w| w["id"] == id)
        .unwrap()
}

#[tokio::test]
async fn test_run_once_renders_settled_json_frame() {
    let addr = start_backend().await;
    let app = Application::new(config_for(format!("http://{addr}"))).unwrap();

    let out = app.run_once(OutputFormat::Json).await.unwrap();
    let frame: Value = serde_json::from_str(&out).unwrap();

    assert_eq!(widget(&frame, "cases")["state"], "populated");
    let threats = &widget(&frame, "threats")["data"]["rows"];
    assert_eq!(threats[0]["severity"], "critical");
    assert_eq!(threats[1]["severity"], "low");
    assert_eq!(widget(&frame, "jobs")["state"], "empty");

    // run_once releases its subscriptions.
    assert!(!app.view().is_mounted());
}

#[tokio::test]
async fn test_run_once_text_frame() {
    let addr = start_backend().await;
    let app = Application::new(config_for(format!("http://{addr}"))).unwrap();

    let out = app.run_once(OutputFormat::Text).await.unwrap();
    assert!(out.contains("Ransomware triage"));
    assert!(out.contains("dropper"));
}

#[tokio::test]
async fn test_unreachable_backend_settles_as_errors() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let app = Application::new(config_for(format!("http://{addr}"))).unwrap();

    let out = app.run_once(OutputFormat::Json).await.unwrap();
    let frame: Value = serde_json::from_str(&out).unwrap();

    let cases = widget(&frame, "cases");
    assert_eq!(cases["state"], "error");
    assert_eq!(cases["permanent"], false);
    assert!(frame["banners"].as_array().unwrap().is_empty());
}

/// Writer whose every write fails, like stdout closed by a pager.
struct BrokenPipe;

impl std::io::Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_write_failure_still_runs_shutdown() {
    let addr = start_backend().await;
    let mut config = config_for(format!("http://{addr}"));
    config.dashboard.render_interval_ms = 50;
    let app = Application::new(config).unwrap();

    let never = std::future::pending::<()>();
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        app.run_with(OutputFormat::Text, &mut BrokenPipe, never),
    )
    .await
    .expect("render loop should stop on the failed write");

    assert!(matches!(result, Err(casewatch::AppError::Io(_))));
    assert!(!app.view().is_mounted());
}

#[tokio::test]
async fn test_run_with_stops_on_shutdown() {
    let addr = start_backend().await;
    let mut config = config_for(format!("http://{addr}"));
    config.dashboard.render_interval_ms = 50;
    let app = Application::new(config).unwrap();

    let mut out = Vec::new();
    let shutdown = tokio::time::sleep(std::time::Duration::from_millis(500));
    app.run_with(OutputFormat::Json, &mut out, shutdown)
        .await
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("\"widgets\""));
    assert!(!app.view().is_mounted());
}
