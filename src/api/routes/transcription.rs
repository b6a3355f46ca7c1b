//! Two-phase workflow: transcribe now, summarize on request.

use axum::{
    extract::{Multipart, Path, State},
    response::Json,
    routing::post,
    Router,
};
use tracing::info;

use super::{parse_task_id, read_upload_form, AppState};
use crate::api::error::ApiResult;
use crate::api::views::{SummaryView, TranscriptionView};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transcription/transcribe", post(transcribe))
        .route("/transcription/summarize/:task_id", post(summarize))
}

/// POST /transcription/transcribe - Leaves the task at `transcribed`.
async fn transcribe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<TranscriptionView>> {
    let form = read_upload_form(multipart, state.machine.max_upload_bytes()).await?;
    let record = state.machine.transcribe_now(form.upload).await?;
    info!("Task {} transcribed, awaiting summarize request", record.id);
    Ok(Json(TranscriptionView::from(&record)))
}

/// POST /transcription/summarize/:task_id - 409 unless the task is `transcribed`.
async fn summarize(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<SummaryView>> {
    let record = state.machine.summarize(parse_task_id(&task_id)?).await?;
    Ok(Json(SummaryView::from(&record)))
}
