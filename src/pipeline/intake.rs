//! Upload acceptance rules, applied before a task record exists.

use axum::body::Bytes;
use std::path::Path;

use crate::error::ValidationError;
use crate::task::UploadInfo;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "mp4", "webm", "flac"];

/// A complete upload held in memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

pub fn validate_upload(upload: &Upload, max_bytes: usize) -> Result<UploadInfo, ValidationError> {
    if upload.filename.trim().is_empty() {
        return Err(ValidationError::MissingFile);
    }

    let extension = file_extension(&upload.filename);
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedFormat {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            },
        });
    }

    let size = upload.bytes.len();
    if size > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size,
            max: max_bytes,
        });
    }
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }

    Ok(UploadInfo {
        original_filename: upload.filename.clone(),
        content_type: content_type_for(&upload.filename, upload.content_type.as_deref()),
        size_bytes: size as u64,
    })
}

/// The declared type when it is meaningful, otherwise one derived from the extension.
pub fn content_type_for(filename: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => match file_extension(filename).as_str() {
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "m4a" => "audio/mp4",
            "mp4" => "video/mp4",
            "webm" => "audio/webm",
            "flac" => "audio/flac",
            _ => "application/octet-stream",
        }
        .to_string(),
    }
}

fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}
