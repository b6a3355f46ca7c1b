//! REST API server for meeting-summary.
//!
//! Provides HTTP endpoints for:
//! - Uploading recordings (background or synchronous processing)
//! - Polling task status and fetching results
//! - The two-phase transcribe / summarize workflow
//!
//! Every route is served at the root and again under `/api/v1`.

pub mod error;
pub mod routes;
pub mod views;

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::future::Future;
use tracing::info;

use crate::config::ServerConfig;
pub use routes::AppState;

/// Room for multipart framing and the other form fields on top of the file.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub struct ApiServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            state,
        }
    }

    /// Serve until `shutdown` resolves, then drain open connections.
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("API server listening on http://{}", addr);
        info!("Endpoints (also under /api/v1):");
        info!("  GET  /                                  - Service info");
        info!("  GET  /version                           - Version info");
        info!("  POST /upload                            - Upload audio, process in background");
        info!("  POST /process-audio                     - Upload audio, wait for the summary");
        info!("  GET  /tasks                             - List tasks");
        info!("  GET  /tasks/:task_id/status             - Task status");
        info!("  GET  /tasks/:task_id/transcription      - Task transcription");
        info!("  GET  /tasks/:task_id/summary            - Task summary");
        info!("  POST /transcription/transcribe          - Upload audio, wait for the transcript");
        info!("  POST /transcription/summarize/:task_id  - Summarize a transcribed task");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("API server error")?;

        Ok(())
    }
}

/// The full application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.machine.max_upload_bytes() + FORM_OVERHEAD_BYTES;

    let api: Router = Router::new()
        .route("/", get(status))
        .route("/version", get(version))
        .merge(routes::upload::router())
        .merge(routes::tasks::router())
        .merge(routes::transcription::router())
        .with_state(state);

    Router::new()
        .nest("/api/v1", api.clone())
        .merge(api)
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meeting-summary",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meeting-summary"
    }))
}
