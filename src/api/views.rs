//! Response bodies, all built from task record snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::PipelineMode;
use crate::task::{TaskId, TaskRecord, TaskStatus};

fn audio_file_path(record: &TaskRecord) -> Option<String> {
    record
        .persistent_path
        .as_ref()
        .map(|p| p.display().to_string())
}

#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    pub task_id: TaskId,
    pub message: String,
    pub status: TaskStatus,
    pub mode: PipelineMode,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadAccepted {
    pub fn new(record: &TaskRecord, mode: PipelineMode) -> Self {
        Self {
            task_id: record.id,
            message: "File uploaded successfully, processing started".to_string(),
            status: record.status,
            mode,
            uploaded_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

/// Everything a completed task produced.
#[derive(Debug, Serialize)]
pub struct TaskResult {
    pub transcription: Option<String>,
    pub summary: Option<String>,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub participants: Vec<String>,
    pub meeting_duration: Option<String>,
    pub audio_file_path: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&TaskRecord> for StatusView {
    fn from(record: &TaskRecord) -> Self {
        let result = (record.status == TaskStatus::Completed).then(|| TaskResult {
            transcription: record.transcription.clone(),
            summary: record.summary.clone(),
            key_points: record.key_points.clone(),
            action_items: record.action_items.clone(),
            participants: record.participants.clone(),
            meeting_duration: record.meeting_duration.clone(),
            audio_file_path: audio_file_path(record),
            completed_at: record.completed_at,
        });

        Self {
            task_id: record.id,
            status: record.status,
            progress: record.progress,
            message: record.message.clone(),
            original_filename: record.original_filename.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            result,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptionView {
    pub task_id: TaskId,
    pub transcription: String,
    pub transcription_language: Option<String>,
    pub audio_duration: Option<f64>,
    pub confidence: Option<f64>,
    pub processed_at: DateTime<Utc>,
    pub audio_file_path: Option<String>,
}

impl From<&TaskRecord> for TranscriptionView {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id,
            transcription: record.transcription.clone().unwrap_or_default(),
            transcription_language: record.transcription_language.clone(),
            audio_duration: record.audio_duration,
            confidence: record.confidence,
            processed_at: record.updated_at,
            audio_file_path: audio_file_path(record),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub task_id: TaskId,
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub participants: Vec<String>,
    pub meeting_duration: Option<String>,
    pub processed_at: DateTime<Utc>,
    pub audio_file_path: Option<String>,
    pub transcription: Option<String>,
    pub transcription_language: Option<String>,
}

impl From<&TaskRecord> for SummaryView {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id,
            summary: record.summary.clone().unwrap_or_default(),
            key_points: record.key_points.clone(),
            action_items: record.action_items.clone(),
            participants: record.participants.clone(),
            meeting_duration: record.meeting_duration.clone(),
            processed_at: record.completed_at.unwrap_or(record.updated_at),
            audio_file_path: audio_file_path(record),
            transcription: record.transcription.clone(),
            transcription_language: record.transcription_language.clone(),
        }
    }
}
