//! Task lifecycle orchestrator.
//!
//! Drives a task through the pipeline:
//! pending → uploading → transcribing → transcribed | summarizing → completed
//!
//! Storage and AI services are injected as trait objects. Stage failures are
//! written into the task record and also returned to synchronous callers.

use axum::body::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::intake::{validate_upload, Upload};
use super::retry::RetryPolicy;
use super::{PipelineMode, StageDeadlines};
use crate::config::Config;
use crate::error::PipelineError;
use crate::gateway::{extract_summary, AudioInput, SpeechToText, Summarizer};
use crate::storage::BlobRelocator;
use crate::task::{TaskId, TaskRecord, TaskRegistry, TaskStatus};

#[derive(Clone)]
pub struct TaskMachine {
    registry: Arc<TaskRegistry>,
    relocator: Arc<dyn BlobRelocator>,
    transcriber: Arc<dyn SpeechToText>,
    summarizer: Arc<dyn Summarizer>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    deadlines: StageDeadlines,
    retry: RetryPolicy,
    max_upload_bytes: usize,
}

impl TaskMachine {
    pub fn new(
        registry: Arc<TaskRegistry>,
        relocator: Arc<dyn BlobRelocator>,
        transcriber: Arc<dyn SpeechToText>,
        summarizer: Arc<dyn Summarizer>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            relocator,
            transcriber,
            summarizer,
            permits: Arc::new(Semaphore::new(config.pipeline.max_concurrent_tasks.max(1))),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            deadlines: StageDeadlines::from_config(&config.pipeline),
            retry: RetryPolicy::from_config(&config.pipeline.retry),
            max_upload_bytes: config.storage.max_upload_bytes,
        }
    }

    pub fn with_deadlines(mut self, deadlines: StageDeadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Validate an upload and register a `pending` task for it.
    pub fn accept(&self, upload: &Upload) -> Result<TaskId, PipelineError> {
        if self.shutdown.is_cancelled() {
            return Err(PipelineError::ShuttingDown);
        }
        let info = validate_upload(upload, self.max_upload_bytes).map_err(|e| {
            warn!("Rejected upload {:?}: {}", upload.filename, e);
            e
        })?;
        let size = info.size_bytes;
        let id = self.registry.create(info);
        info!(
            "Accepted upload {:?} ({} bytes) as task {}",
            upload.filename, size, id
        );
        Ok(id)
    }

    /// Accept an upload and process it in the background.
    ///
    /// Returns the freshly created `pending` record.
    pub fn submit(&self, upload: Upload, mode: PipelineMode) -> Result<TaskRecord, PipelineError> {
        let id = self.accept(&upload)?;
        let snapshot = self.registry.get(id)?;

        let machine = self.clone();
        self.spawn_flow(id, async move { machine.run(id, upload.bytes, mode).await });

        Ok(snapshot)
    }

    /// Accept an upload and transcribe it before returning. The task stops at `transcribed`.
    ///
    /// The flow runs on the machine's tracker, so dropping the caller leaves it running.
    pub async fn transcribe_now(&self, upload: Upload) -> Result<TaskRecord, PipelineError> {
        let id = self.accept(&upload)?;
        let machine = self.clone();
        let handle = self.spawn_flow(id, async move {
            machine.run(id, upload.bytes, PipelineMode::TwoPhase).await
        });
        self.join(id, handle).await
    }

    /// Accept an upload and run every stage before returning.
    pub async fn process_now(&self, upload: Upload) -> Result<TaskRecord, PipelineError> {
        let id = self.accept(&upload)?;
        let machine = self.clone();
        let handle = self.spawn_flow(id, async move {
            machine.run(id, upload.bytes, PipelineMode::OneShot).await
        });
        self.join(id, handle).await
    }

    /// Process a `pending` task once a worker slot is free.
    ///
    /// A task that already left `pending` is rejected untouched.
    pub async fn run(
        &self,
        id: TaskId,
        bytes: Bytes,
        mode: PipelineMode,
    ) -> Result<TaskRecord, PipelineError> {
        let _permit = match self.acquire_permit().await {
            Ok(permit) => permit,
            Err(e) => {
                // Still pending, so nothing else will ever pick it up.
                if let Err(update) = self
                    .registry
                    .update(id, |r| r.fail("processing cancelled: service shutting down"))
                {
                    warn!("Could not mark task {} as failed: {}", id, update);
                }
                return Err(e);
            }
        };

        self.registry.update(id, |r| r.begin_upload())?;
        info!("Task {} started ({})", id, mode);

        let record = self.relocate_stage(id, bytes.clone()).await?;
        let record = self.transcribe_stage(&record, bytes, mode).await?;

        match mode {
            PipelineMode::TwoPhase => Ok(record),
            PipelineMode::OneShot => self.summarize_stage(&record).await,
        }
    }

    /// Summarize a `transcribed` task. Any other state is an invalid transition.
    ///
    /// Unknown tasks and wrong states are rejected before waiting for a worker slot.
    pub async fn summarize(&self, id: TaskId) -> Result<TaskRecord, PipelineError> {
        self.registry.get(id)?.ensure_summarizable()?;
        if self.shutdown.is_cancelled() {
            return Err(PipelineError::ShuttingDown);
        }

        let machine = self.clone();
        let handle = self.spawn_flow(id, async move { machine.summarize_flow(id).await });
        self.join(id, handle).await
    }

    pub fn status(&self, id: TaskId) -> Result<TaskRecord, PipelineError> {
        self.registry.get(id)
    }

    /// The record, once its transcription exists.
    pub fn transcription(&self, id: TaskId) -> Result<TaskRecord, PipelineError> {
        let record = self.registry.get(id)?;
        if record.transcription.is_none() {
            return Err(PipelineError::NotReady {
                task_id: id,
                status: record.status,
                what: "transcription",
            });
        }
        Ok(record)
    }

    /// The record, once it is `completed`.
    pub fn summary(&self, id: TaskId) -> Result<TaskRecord, PipelineError> {
        let record = self.registry.get(id)?;
        if record.status != TaskStatus::Completed {
            return Err(PipelineError::NotReady {
                task_id: id,
                status: record.status,
                what: "summary",
            });
        }
        Ok(record)
    }

    pub fn list(&self) -> Vec<TaskRecord> {
        self.registry.list()
    }

    /// Cancel in-flight stages and wait for background flows to record it.
    pub async fn shutdown(&self) {
        info!("Stopping task machine");
        self.shutdown.cancel();
        self.permits.close();
        self.tracker.close();
        self.tracker.wait().await;
        info!("All task flows stopped");
    }

    async fn summarize_flow(&self, id: TaskId) -> Result<TaskRecord, PipelineError> {
        let _permit = self.acquire_permit().await?;
        let record = self.registry.update(id, |r| r.begin_summarize())?;
        info!("Summarization requested for task {}", id);
        self.summarize_stage(&record).await
    }

    fn spawn_flow<F>(&self, id: TaskId, flow: F) -> JoinHandle<Result<TaskRecord, PipelineError>>
    where
        F: Future<Output = Result<TaskRecord, PipelineError>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            let outcome = flow.await;
            if let Err(e) = &outcome {
                debug!("Flow for task {} ended with: {}", id, e);
            }
            outcome
        })
    }

    /// Wait for a tracked flow. A worker that died leaves its task `failed`.
    async fn join(
        &self,
        id: TaskId,
        handle: JoinHandle<Result<TaskRecord, PipelineError>>,
    ) -> Result<TaskRecord, PipelineError> {
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(self.fail(
                id,
                PipelineError::Internal(format!("task worker stopped: {e}")),
            )),
        }
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, PipelineError> {
        if self.shutdown.is_cancelled() {
            return Err(PipelineError::ShuttingDown);
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(PipelineError::ShuttingDown),
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| PipelineError::ShuttingDown)
            }
        }
    }

    async fn relocate_stage(&self, id: TaskId, bytes: Bytes) -> Result<TaskRecord, PipelineError> {
        let record = self.registry.get(id)?;

        let outcome = self
            .guarded("relocation", self.deadlines.relocate, async {
                self.relocator
                    .relocate(bytes, &record.original_filename, id, record.created_at)
                    .await
                    .map_err(|e| format!("{e:#}"))
            })
            .await;

        match outcome {
            Ok(path) => {
                let record = self.registry.update(id, |r| r.record_relocation(path))?;
                info!("Task {} audio stored at {:?}", id, record.persistent_path);
                Ok(record)
            }
            Err(message) => Err(self.fail(id, PipelineError::Storage(message))),
        }
    }

    async fn transcribe_stage(
        &self,
        record: &TaskRecord,
        bytes: Bytes,
        mode: PipelineMode,
    ) -> Result<TaskRecord, PipelineError> {
        let id = record.id;
        let audio = AudioInput {
            bytes,
            filename: record.original_filename.clone(),
            content_type: record.content_type.clone(),
        };

        info!("Task {} transcribing via {}", id, self.transcriber.name());
        let outcome = self
            .guarded("transcription", self.deadlines.transcribe, async {
                self.retry
                    .run("transcription", move || {
                        self.transcriber.transcribe(audio.clone())
                    })
                    .await
                    .map_err(|e| e.to_string())
            })
            .await;

        match outcome {
            Ok(transcript) => {
                let record = self
                    .registry
                    .update(id, |r| r.record_transcript(transcript, mode))?;
                info!(
                    "Task {} transcribed ({} chars)",
                    id,
                    record.transcription.as_deref().map_or(0, str::len)
                );
                Ok(record)
            }
            Err(message) => Err(self.fail(id, PipelineError::Transcription(message))),
        }
    }

    async fn summarize_stage(&self, record: &TaskRecord) -> Result<TaskRecord, PipelineError> {
        let id = record.id;
        let Some(transcription) = record.transcription.as_deref() else {
            return Err(self.fail(
                id,
                PipelineError::Summarization("no transcription to summarize".to_string()),
            ));
        };

        info!("Task {} summarizing via {}", id, self.summarizer.name());
        let outcome = self
            .guarded("summarization", self.deadlines.summarize, async {
                let raw = self
                    .retry
                    .run("summarization", move || self.summarizer.summarize(transcription))
                    .await
                    .map_err(|e| e.to_string())?;
                debug!("Task {} raw summary: {}", id, raw);
                extract_summary(&raw).map_err(|e| e.to_string())
            })
            .await;

        match outcome {
            Ok(summary) => {
                let record = self.registry.update(id, |r| r.record_summary(summary))?;
                info!(
                    "Task {} completed: {} key points, {} action items",
                    id,
                    record.key_points.len(),
                    record.action_items.len()
                );
                Ok(record)
            }
            Err(message) => Err(self.fail(id, PipelineError::Summarization(message))),
        }
    }

    /// Run one stage under its deadline and the shutdown token.
    async fn guarded<T, F>(&self, stage: &str, limit: Duration, work: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, String>>,
    {
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                Err(format!("{} cancelled: service shutting down", stage))
            }
            outcome = tokio::time::timeout(limit, work) => match outcome {
                Ok(result) => result,
                Err(_) => Err(format!("{} timed out after {}", stage, format_limit(limit))),
            },
        }
    }

    fn fail(&self, id: TaskId, err: PipelineError) -> PipelineError {
        error!("Task {} failed: {}", id, err);
        if let Err(e) = self.registry.update(id, |r| r.fail(err.to_string())) {
            warn!("Could not mark task {} as failed: {}", id, e);
        }
        err
    }
}

fn format_limit(limit: Duration) -> String {
    if limit.subsec_millis() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}
