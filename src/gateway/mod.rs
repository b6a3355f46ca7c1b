//! External AI gateway: speech-to-text and meeting summarization.
//!
//! Both capabilities are opaque one-shot services. The pipeline only sees the
//! traits below; the OpenAI implementation lives in [`openai`].

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod openai;
pub mod parse;
pub mod prompt;

pub use openai::{OpenAISummarizer, OpenAITranscriber};
pub use parse::extract_summary;

/// Output of a successful transcription call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
    pub duration: Option<f64>,
    pub confidence: Option<f64>,
}

/// Structured meeting minutes recovered from the summarizer's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub participants: Vec<String>,
    pub meeting_duration: Option<String>,
}

/// Audio handed to the speech-to-text service.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP transport or connection error.
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    /// Provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl GatewayError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) | Self::EmptyResponse => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Request(e.to_string())
        }
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcribe(&self, audio: AudioInput) -> Result<Transcript, GatewayError>;
}

/// Returns the provider's raw text; structure is recovered by [`extract_summary`].
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, transcription: &str) -> Result<String, GatewayError>;
}
