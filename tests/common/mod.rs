//! Fake AI gateways and a task machine wired to a temporary audio directory.

#![allow(dead_code)]

use async_trait::async_trait;
use meeting_summary::config::Config;
use meeting_summary::gateway::{AudioInput, GatewayError, SpeechToText, Summarizer, Transcript};
use meeting_summary::pipeline::TaskMachine;
use meeting_summary::storage::FileRelocator;
use meeting_summary::task::{TaskId, TaskRecord, TaskRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const TRANSCRIPT: &str = "Chúng ta bắt đầu cuộc họp kế hoạch quý. Lan sẽ gửi báo cáo, Minh đặt phòng.";

pub const FENCED_SUMMARY: &str = "Đây là biên bản cuộc họp:\n\n```json\n{\n  \"summary\": \"Họp kế hoạch quý\",\n  \"key_points\": [\"Ngân sách\", \"Tuyển dụng\", \"Lộ trình sản phẩm\"],\n  \"action_items\": [\"Lan: gửi báo cáo\", \"Minh: đặt phòng họp\"],\n  \"participants\": [\"Lan\", \"Minh\", \"Lan\"],\n  \"meeting_duration\": \"45 phút\"\n}\n```\n";

/// What a fake gateway answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Non-success HTTP status from the provider.
    Status(u16),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

pub struct FakeTranscriber {
    reply: Reply,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for FakeTranscriber {
    fn name(&self) -> &'static str {
        "fake transcriber"
    }

    async fn transcribe(&self, audio: AudioInput) -> Result<Transcript, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.reply {
            Reply::Text(text) => Ok(Transcript {
                text: text.clone(),
                language: Some("vi".to_string()),
                duration: Some(audio.bytes.len() as f64 / 16_000.0),
                confidence: Some(0.92),
            }),
            Reply::Status(status) => Err(GatewayError::Api {
                status: *status,
                message: "fake provider failure".to_string(),
            }),
        }
    }
}

pub struct FakeSummarizer {
    reply: Reply,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn name(&self) -> &'static str {
        "fake summarizer"
    }

    async fn summarize(&self, _transcription: &str) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Status(status) => Err(GatewayError::Api {
                status: *status,
                message: "fake provider failure".to_string(),
            }),
        }
    }
}

pub struct Harness {
    pub machine: TaskMachine,
    pub transcriber: Arc<FakeTranscriber>,
    pub summarizer: Arc<FakeSummarizer>,
    pub config: Config,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(transcriber: FakeTranscriber, summarizer: FakeSummarizer) -> Self {
        Self::with_config(transcriber, summarizer, |_| {})
    }

    pub fn with_config(
        transcriber: FakeTranscriber,
        summarizer: FakeSummarizer,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.audio_dir = Some(dir.path().join("processed_audio_files"));
        configure(&mut config);

        let transcriber = Arc::new(transcriber);
        let summarizer = Arc::new(summarizer);
        let audio_dir = config.storage.resolved_audio_dir().unwrap();

        let machine = TaskMachine::new(
            Arc::new(TaskRegistry::new()),
            Arc::new(FileRelocator::new(audio_dir)),
            transcriber.clone(),
            summarizer.clone(),
            &config,
        );

        Self {
            machine,
            transcriber,
            summarizer,
            config,
            dir,
        }
    }

    /// Fakes that succeed with the sample transcript and fenced summary.
    pub fn happy() -> Self {
        Self::new(
            FakeTranscriber::new(Reply::text(TRANSCRIPT)),
            FakeSummarizer::new(Reply::text(FENCED_SUMMARY)),
        )
    }
}

/// Poll until `done` holds for the task, returning every snapshot seen.
pub async fn poll_until(
    machine: &TaskMachine,
    id: TaskId,
    done: impl Fn(&TaskRecord) -> bool,
) -> Vec<TaskRecord> {
    let mut seen = Vec::new();
    for _ in 0..500 {
        let record = machine.status(id).unwrap();
        let finished = done(&record);
        seen.push(record);
        if finished {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not reach the expected state: {:?}", id, seen.last());
}
