//! API route modules and the pieces they share.

pub mod tasks;
pub mod transcription;
pub mod upload;

use axum::extract::Multipart;
use tracing::debug;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::error::ValidationError;
use crate::pipeline::{PipelineMode, TaskMachine, Upload};
use crate::task::TaskId;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub machine: TaskMachine,
    /// Mode used by `/upload` when the form does not name one.
    pub default_mode: PipelineMode,
}

/// A multipart upload form: the `file` field plus an optional `mode`.
pub struct UploadForm {
    pub upload: Upload,
    pub mode: Option<PipelineMode>,
}

/// Read the form, enforcing `max_bytes` while the file streams in.
pub async fn read_upload_form(mut multipart: Multipart, max_bytes: usize) -> ApiResult<UploadForm> {
    let mut upload: Option<Upload> = None;
    let mut mode = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);

                let mut bytes: Vec<u8> = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file chunk: {e}")))?
                {
                    bytes.extend_from_slice(&chunk);
                    if bytes.len() > max_bytes {
                        return Err(ValidationError::FileTooLarge {
                            size: bytes.len(),
                            max: max_bytes,
                        }
                        .into());
                    }
                }

                debug!(
                    file_name = %filename,
                    size_bytes = bytes.len(),
                    "received file upload"
                );

                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes: bytes.into(),
                });
            }
            "mode" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read mode: {e}")))?;
                mode = Some(value.parse::<PipelineMode>()?);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let upload = upload.ok_or(ValidationError::MissingFile)?;
    Ok(UploadForm { upload, mode })
}

/// Malformed ids can never match a task, so they are reported as not found.
pub fn parse_task_id(raw: &str) -> ApiResult<TaskId> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found(format!("Task {} not found", raw)))
}
