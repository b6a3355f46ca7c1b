//! Error types for the meeting pipeline.

use thiserror::Error;

use crate::task::{TaskId, TaskStatus};

/// Upload rejected before any task record exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file format: {extension}. Supported formats: mp3, wav, m4a, mp4, webm, flac")]
    UnsupportedFormat { extension: String },

    #[error("File size {size} bytes exceeds maximum allowed size {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("File is empty")]
    EmptyFile,

    #[error("No file uploaded")]
    MissingFile,

    #[error("Invalid mode '{value}': expected two_phase or one_shot")]
    InvalidMode { value: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("summarization error: {0}")]
    Summarization(String),

    #[error("cannot {action} task {task_id} while it is {status}")]
    InvalidStateTransition {
        task_id: TaskId,
        status: TaskStatus,
        action: &'static str,
    },

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("{what} not ready for task {task_id} (status: {status})")]
    NotReady {
        task_id: TaskId,
        status: TaskStatus,
        what: &'static str,
    },

    #[error("service is shutting down")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidStateTransition { .. })
    }
}
