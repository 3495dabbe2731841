//! HTTP frame server using axum.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::types::DashboardFrame;
use crate::view::{render_text, DashboardView};

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    view: Arc<DashboardView>,
}

impl AppState {
    pub fn new(view: Arc<DashboardView>) -> Self {
        Self { view }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/frame", get(get_frame))
        .route("/api/frame.txt", get(get_frame_text))
        .route("/metrics", get(get_metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Current frame as JSON.
async fn get_frame(State(state): State<AppState>) -> Json<DashboardFrame> {
    Json(state.view.frame())
}

async fn get_frame_text(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_text(&state.view.frame()),
    )
        .into_response()
}

async fn get_metrics() -> Response {
    match casewatch_telemetry::gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    view: Arc<DashboardView>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(AppState::new(view));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Run the dashboard HTTP server.
pub async fn run_server(
    view: Arc<DashboardView>,
    config: DashboardConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Starting dashboard server");

    let listener = TcpListener::bind(addr).await?;
    serve(listener, view, shutdown).await?;

    info!("Dashboard server stopped");
    Ok(())
}
