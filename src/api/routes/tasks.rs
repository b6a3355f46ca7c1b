//! Read-only task views.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use super::{parse_task_id, AppState};
use crate::api::error::ApiResult;
use crate::api::views::{StatusView, SummaryView, TranscriptionView};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/:task_id/status", get(task_status))
        .route("/tasks/:task_id/transcription", get(task_transcription))
        .route("/tasks/:task_id/summary", get(task_summary))
}

/// GET /tasks - Every task, newest first.
async fn list_tasks(State(state): State<AppState>) -> Json<Vec<StatusView>> {
    Json(state.machine.list().iter().map(StatusView::from).collect())
}

/// GET /tasks/:task_id/status
async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<StatusView>> {
    let record = state.machine.status(parse_task_id(&task_id)?)?;
    Ok(Json(StatusView::from(&record)))
}

/// GET /tasks/:task_id/transcription - 400 until the transcript exists.
async fn task_transcription(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TranscriptionView>> {
    let record = state.machine.transcription(parse_task_id(&task_id)?)?;
    Ok(Json(TranscriptionView::from(&record)))
}

/// GET /tasks/:task_id/summary - 400 until the task is completed.
async fn task_summary(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<SummaryView>> {
    let record = state.machine.summary(parse_task_id(&task_id)?)?;
    Ok(Json(SummaryView::from(&record)))
}
