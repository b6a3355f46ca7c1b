//! Pipeline orchestration: intake validation, stage deadlines, retries and the
//! task state machine driver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::ValidationError;

pub mod intake;
pub mod retry;
pub mod task_machine;

pub use intake::{content_type_for, validate_upload, Upload, SUPPORTED_EXTENSIONS};
pub use retry::RetryPolicy;
pub use task_machine::TaskMachine;

/// Whether a task pauses at `transcribed` or runs straight through to the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    TwoPhase,
    OneShot,
}

impl PipelineMode {
    pub fn from_auto_summarize(auto_summarize: bool) -> Self {
        if auto_summarize {
            Self::OneShot
        } else {
            Self::TwoPhase
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoPhase => "two_phase",
            Self::OneShot => "one_shot",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "two_phase" | "two-phase" | "transcribe" => Ok(Self::TwoPhase),
            "one_shot" | "one-shot" | "full" => Ok(Self::OneShot),
            _ => Err(ValidationError::InvalidMode {
                value: s.trim().to_string(),
            }),
        }
    }
}

/// Upper bound on each blocking stage of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDeadlines {
    pub relocate: Duration,
    pub transcribe: Duration,
    pub summarize: Duration,
}

impl StageDeadlines {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            relocate: config.relocate_timeout(),
            transcribe: config.transcribe_timeout(),
            summarize: config.summarize_timeout(),
        }
    }

    /// Same limit for every stage. Handy for tests.
    pub fn uniform(limit: Duration) -> Self {
        Self {
            relocate: limit,
            transcribe: limit,
            summarize: limit,
        }
    }
}

impl Default for StageDeadlines {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
