//! Upload endpoints.
//!
//! - `POST /upload` - accept a recording and process it in the background
//! - `POST /process-audio` - process a recording end to end before answering

use axum::{
    extract::{Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use tracing::info;

use super::{read_upload_form, AppState};
use crate::api::error::ApiResult;
use crate::api::views::{SummaryView, UploadAccepted};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_audio))
        .route("/process-audio", post(process_audio))
}

/// POST /upload - Returns as soon as the task is registered.
async fn upload_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadAccepted>> {
    let form = read_upload_form(multipart, state.machine.max_upload_bytes()).await?;
    let mode = form.mode.unwrap_or(state.default_mode);

    let record = state.machine.submit(form.upload, mode)?;
    info!("Upload accepted as task {} ({})", record.id, mode);

    Ok(Json(UploadAccepted::new(&record, mode)))
}

/// POST /process-audio - Upload, transcribe and summarize in one request.
async fn process_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<SummaryView>> {
    let form = read_upload_form(multipart, state.machine.max_upload_bytes()).await?;
    let record = state.machine.process_now(form.upload).await?;
    Ok(Json(SummaryView::from(&record)))
}
