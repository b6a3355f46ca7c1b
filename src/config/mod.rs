use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides `openai.api_key`.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub openai: OpenAIConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where retained recordings go. Defaults to the data directory.
    pub audio_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub transcription_model: String,
    pub language: String,
    pub chat_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default for `/upload` when the client does not pick a mode:
    /// `true` runs straight through to the summary.
    pub auto_summarize: bool,
    pub max_concurrent_tasks: usize,
    pub relocate_timeout_secs: u64,
    pub transcribe_timeout_secs: u64,
    pub summarize_timeout_secs: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per gateway call, including the first one.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audio_dir: None,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_endpoint: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            language: "vi".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 2000,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_summarize: true,
            max_concurrent_tasks: 4,
            relocate_timeout_secs: 30,
            transcribe_timeout_secs: 600,
            summarize_timeout_secs: 300,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 500,
        }
    }
}

impl StorageConfig {
    pub fn resolved_audio_dir(&self) -> Result<PathBuf> {
        match &self.audio_dir {
            Some(dir) => Ok(dir.clone()),
            None => global::audio_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn relocate_timeout(&self) -> Duration {
        Duration::from_secs(self.relocate_timeout_secs)
    }

    pub fn transcribe_timeout(&self) -> Duration {
        Duration::from_secs(self.transcribe_timeout_secs)
    }

    pub fn summarize_timeout(&self) -> Duration {
        Duration::from_secs(self.summarize_timeout_secs)
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file is written out with defaults so users have something to edit.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => global::config_file()?,
        };

        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
            info!("Loaded config from {:?}", config_path);
            config
        } else {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            config
        };

        config.apply_env();
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.openai.api_key = Some(key);
            }
        }
    }

    /// TOML rendering with the API key masked, for display.
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.openai.api_key.is_some() {
            shown.openai.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).context("Failed to serialize config")
    }
}
