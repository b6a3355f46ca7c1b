//! Task record and the transitions it is allowed to take.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::gateway::{MeetingSummary, Transcript};
use crate::pipeline::PipelineMode;

pub type TaskId = Uuid;

/// Progress checkpoints reported to polling clients.
pub mod progress {
    pub const UPLOADING: u8 = 10;
    pub const RELOCATED: u8 = 30;
    pub const TRANSCRIBED: u8 = 70;
    pub const SUMMARY_REQUESTED: u8 = 80;
    pub const COMPLETED: u8 = 100;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Transcribing,
    Transcribed,
    Summarizing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::Transcribed => "transcribed",
            Self::Summarizing => "summarizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the upload told us about the file, captured once at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,

    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub persistent_path: Option<PathBuf>,

    pub transcription: Option<String>,
    pub transcription_language: Option<String>,
    pub audio_duration: Option<f64>,
    pub confidence: Option<f64>,

    pub summary: Option<String>,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub participants: Vec<String>,
    pub meeting_duration: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(id: TaskId, info: UploadInfo) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            message: "Task created, waiting to start".to_string(),
            original_filename: info.original_filename,
            content_type: info.content_type,
            size_bytes: info.size_bytes,
            persistent_path: None,
            transcription: None,
            transcription_language: None,
            audio_duration: None,
            confidence: None,
            summary: None,
            key_points: Vec::new(),
            action_items: Vec::new(),
            participants: Vec::new(),
            meeting_duration: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// `pending → uploading`
    pub fn begin_upload(&mut self) -> Result<(), PipelineError> {
        self.require(TaskStatus::Pending, "start processing")?;
        self.advance(
            TaskStatus::Uploading,
            progress::UPLOADING,
            "Saving audio file",
        );
        Ok(())
    }

    /// `uploading → transcribing`, recording where the audio now lives.
    pub fn record_relocation(&mut self, path: PathBuf) -> Result<(), PipelineError> {
        self.require(TaskStatus::Uploading, "record stored audio for")?;
        if self.persistent_path.is_some() {
            return Err(self.invalid("record stored audio for"));
        }
        self.persistent_path = Some(path);
        self.advance(
            TaskStatus::Transcribing,
            progress::RELOCATED,
            "Transcribing audio",
        );
        Ok(())
    }

    /// `transcribing → transcribed` (two-phase) or `transcribing → summarizing` (one-shot).
    pub fn record_transcript(
        &mut self,
        transcript: Transcript,
        mode: PipelineMode,
    ) -> Result<(), PipelineError> {
        self.require(TaskStatus::Transcribing, "record transcript for")?;
        self.transcription = Some(transcript.text);
        self.transcription_language = transcript.language;
        self.audio_duration = transcript.duration;
        self.confidence = transcript.confidence;

        match mode {
            PipelineMode::TwoPhase => self.advance(
                TaskStatus::Transcribed,
                progress::TRANSCRIBED,
                "Transcription completed, awaiting summarization",
            ),
            PipelineMode::OneShot => self.advance(
                TaskStatus::Summarizing,
                progress::TRANSCRIBED,
                "Transcription completed, summarizing meeting",
            ),
        }
        Ok(())
    }

    /// Whether the user may trigger summarization now.
    pub fn ensure_summarizable(&self) -> Result<(), PipelineError> {
        self.require(TaskStatus::Transcribed, "summarize")
    }

    /// `transcribed → summarizing`, the explicit user trigger.
    pub fn begin_summarize(&mut self) -> Result<(), PipelineError> {
        self.ensure_summarizable()?;
        self.advance(
            TaskStatus::Summarizing,
            progress::SUMMARY_REQUESTED,
            "Summarizing meeting",
        );
        Ok(())
    }

    /// `summarizing → completed`
    pub fn record_summary(&mut self, summary: MeetingSummary) -> Result<(), PipelineError> {
        self.require(TaskStatus::Summarizing, "record summary for")?;
        self.summary = Some(summary.summary);
        self.key_points = summary.key_points;
        self.action_items = summary.action_items;
        self.participants = summary.participants;
        self.meeting_duration = summary.meeting_duration;
        self.advance(
            TaskStatus::Completed,
            progress::COMPLETED,
            "Meeting summary completed",
        );
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// Any non-terminal state `→ failed`. Progress stays where the failure happened.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), PipelineError> {
        if self.status.is_terminal() {
            return Err(self.invalid("fail"));
        }
        self.status = TaskStatus::Failed;
        self.message = message.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require(&self, expected: TaskStatus, action: &'static str) -> Result<(), PipelineError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> PipelineError {
        PipelineError::InvalidStateTransition {
            task_id: self.id,
            status: self.status,
            action,
        }
    }

    fn advance(&mut self, status: TaskStatus, progress: u8, message: &str) {
        self.status = status;
        self.progress = self.progress.max(progress);
        self.message = message.to_string();
        self.updated_at = Utc::now();
    }
}
