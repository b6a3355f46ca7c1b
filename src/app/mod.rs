use crate::api::{ApiServer, AppState};
use crate::config::Config;
use crate::gateway::{OpenAISummarizer, OpenAITranscriber};
use crate::pipeline::{PipelineMode, TaskMachine};
use crate::storage::FileRelocator;
use crate::task::TaskRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting meeting-summary service");

    let machine = build_machine(&config)?;
    let state = AppState {
        machine: machine.clone(),
        default_mode: PipelineMode::from_auto_summarize(config.pipeline.auto_summarize),
    };

    info!(
        "Default upload mode: {}, max concurrent tasks: {}",
        state.default_mode, config.pipeline.max_concurrent_tasks
    );

    let server = ApiServer::new(&config.server, state);
    let result = server.start(shutdown_signal()).await;
    if let Err(e) = &result {
        error!("API server failed: {:#}", e);
    }

    machine.shutdown().await;
    info!("meeting-summary stopped");
    result
}

fn build_machine(config: &Config) -> Result<TaskMachine> {
    let audio_dir = config.storage.resolved_audio_dir()?;
    std::fs::create_dir_all(&audio_dir)
        .with_context(|| format!("Failed to create audio directory {}", audio_dir.display()))?;
    info!("Retaining uploaded audio in {:?}", audio_dir);

    let transcriber = OpenAITranscriber::new(&config.openai)
        .context("Set OPENAI_API_KEY or openai.api_key in the config file")?;
    let summarizer = OpenAISummarizer::new(&config.openai)
        .context("Set OPENAI_API_KEY or openai.api_key in the config file")?;

    Ok(TaskMachine::new(
        Arc::new(TaskRegistry::new()),
        Arc::new(FileRelocator::new(audio_dir)),
        Arc::new(transcriber),
        Arc::new(summarizer),
        config,
    ))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
