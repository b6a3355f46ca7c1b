use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::prompt::meeting_summary_prompt;
use super::{AudioInput, GatewayError, SpeechToText, Summarizer, Transcript};
use crate::config::OpenAIConfig;

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    language: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionSegment {
    avg_logprob: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    r#type: Option<String>,
}

/// Speech-to-text through the OpenAI `audio/transcriptions` endpoint.
pub struct OpenAITranscriber {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    language: String,
}

impl OpenAITranscriber {
    pub fn new(config: &OpenAIConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("api_key is required for the OpenAI transcription gateway")?;
        let endpoint = format!(
            "{}/audio/transcriptions",
            config.api_endpoint.trim_end_matches('/')
        );

        info!("Initialized OpenAI transcriber with endpoint: {}", endpoint);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
            model: config.transcription_model.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for OpenAITranscriber {
    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }

    async fn transcribe(&self, audio: AudioInput) -> Result<Transcript, GatewayError> {
        info!(
            "Transcribing {} ({} bytes) via {}",
            audio.filename,
            audio.bytes.len(),
            self.name()
        );

        let part = Part::bytes(audio.bytes.to_vec())
            .file_name(audio.filename)
            .mime_str(&audio.content_type)
            .map_err(|e| GatewayError::Request(format!("invalid content type: {e}")))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let body = read_success_body(response, "transcription").await?;
        let parsed: VerboseTranscription =
            serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))?;

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        info!("Transcription complete: {} chars", text.len());
        debug!("Raw transcription: {}", text);

        Ok(Transcript {
            text,
            language: parsed.language.or_else(|| Some(self.language.clone())),
            duration: parsed.duration,
            confidence: segment_confidence(&parsed.segments),
        })
    }
}

/// Mean per-segment probability, derived from Whisper's average log-probabilities.
fn segment_confidence(segments: &[TranscriptionSegment]) -> Option<f64> {
    let probs: Vec<f64> = segments
        .iter()
        .filter_map(|s| s.avg_logprob)
        .map(|lp| lp.exp().clamp(0.0, 1.0))
        .collect();
    if probs.is_empty() {
        None
    } else {
        Some(probs.iter().sum::<f64>() / probs.len() as f64)
    }
}

/// Meeting summarization through an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAISummarizer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    language: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAISummarizer {
    pub fn new(config: &OpenAIConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("api_key is required for the OpenAI summarization gateway")?;
        let endpoint = format!(
            "{}/chat/completions",
            config.api_endpoint.trim_end_matches('/')
        );

        info!("Initialized OpenAI summarizer with endpoint: {}", endpoint);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
            model: config.chat_model.clone(),
            language: config.language.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Summarizer for OpenAISummarizer {
    fn name(&self) -> &'static str {
        "OpenAI Chat"
    }

    async fn summarize(&self, transcription: &str) -> Result<String, GatewayError> {
        info!(
            "Starting meeting summarization. Text length: {}",
            transcription.len()
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": meeting_summary_prompt(transcription, &self.language) }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let body = read_success_body(response, "chat completion").await?;
        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(GatewayError::EmptyResponse)?
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        debug!("Raw summarizer response: {}", content);
        Ok(content)
    }
}

async fn read_success_body(
    response: reqwest::Response,
    what: &str,
) -> Result<String, GatewayError> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        return Ok(text);
    }

    error!(
        "OpenAI {} request failed with status {}: {}",
        what, status, text
    );

    let message = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(err) => match err.error.r#type {
            Some(kind) => format!("{} ({})", err.error.message, kind),
            None => err.error.message,
        },
        Err(_) => text,
    };

    Err(GatewayError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn config(endpoint: &str) -> OpenAIConfig {
        OpenAIConfig {
            api_key: Some("sk-test".to_string()),
            api_endpoint: endpoint.to_string(),
            ..OpenAIConfig::default()
        }
    }

    fn audio() -> AudioInput {
        AudioInput {
            bytes: Bytes::from_static(b"ID3fake-mp3-bytes"),
            filename: "meeting.mp3".to_string(),
            content_type: "audio/mpeg".to_string(),
        }
    }

    #[test]
    fn test_requires_api_key() {
        let mut cfg = config("http://localhost");
        cfg.api_key = None;
        assert!(OpenAITranscriber::new(&cfg).is_err());
        cfg.api_key = Some("  ".to_string());
        assert!(OpenAISummarizer::new(&cfg).is_err());
    }

    #[test]
    fn test_segment_confidence() {
        assert_eq!(segment_confidence(&[]), None);
        let segments = vec![
            TranscriptionSegment {
                avg_logprob: Some(0.0),
            },
            TranscriptionSegment {
                avg_logprob: Some((0.5f64).ln()),
            },
        ];
        let confidence = segment_confidence(&segments).unwrap();
        assert!((confidence - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_transcribe_against_stub() {
        async fn handler(mut multipart: Multipart) -> Json<Value> {
            let mut model = String::new();
            let mut file_len = 0;
            while let Some(field) = multipart.next_field().await.unwrap() {
                let name = field.name().unwrap_or_default().to_string();
                match name.as_str() {
                    "model" => model = field.text().await.unwrap(),
                    "file" => file_len = field.bytes().await.unwrap().len(),
                    _ => {}
                }
            }
            Json(json!({
                "text": format!(" Chúng ta bắt đầu ({model}, {file_len}) "),
                "language": "vietnamese",
                "duration": 8.5,
                "segments": [{ "avg_logprob": 0.0 }]
            }))
        }

        let endpoint = spawn_stub(Router::new().route("/v1/audio/transcriptions", post(handler))).await;
        let transcriber = OpenAITranscriber::new(&config(&endpoint)).unwrap();

        let transcript = transcriber.transcribe(audio()).await.unwrap();
        assert_eq!(transcript.text, "Chúng ta bắt đầu (whisper-1, 17)");
        assert_eq!(transcript.language.as_deref(), Some("vietnamese"));
        assert_eq!(transcript.duration, Some(8.5));
        assert_eq!(transcript.confidence, Some(1.0));
    }

    #[tokio::test]
    async fn test_transcribe_maps_api_errors() {
        async fn handler() -> (StatusCode, Json<Value>) {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Incorrect API key", "type": "invalid_request_error" } })),
            )
        }

        let endpoint = spawn_stub(Router::new().route("/v1/audio/transcriptions", post(handler))).await;
        let transcriber = OpenAITranscriber::new(&config(&endpoint)).unwrap();

        match transcriber.transcribe(audio()).await {
            Err(GatewayError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key (invalid_request_error)");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_summarize_returns_raw_content() {
        async fn handler(Json(body): Json<Value>) -> Json<Value> {
            let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
            assert!(prompt.contains("Chúng ta bắt đầu"));
            assert_eq!(body["model"], "gpt-4o-mini");
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "```json\n{\"summary\": \"ok\"}\n```" } }]
            }))
        }

        let endpoint = spawn_stub(Router::new().route("/v1/chat/completions", post(handler))).await;
        let summarizer = OpenAISummarizer::new(&config(&endpoint)).unwrap();

        let raw = summarizer.summarize("Chúng ta bắt đầu").await.unwrap();
        assert!(raw.starts_with("```json"));
        assert_eq!(super::super::extract_summary(&raw).unwrap().summary, "ok");
    }

    #[tokio::test]
    async fn test_summarize_empty_choice() {
        async fn handler() -> Json<Value> {
            Json(json!({ "choices": [] }))
        }

        let endpoint = spawn_stub(Router::new().route("/v1/chat/completions", post(handler))).await;
        let summarizer = OpenAISummarizer::new(&config(&endpoint)).unwrap();

        assert!(matches!(
            summarizer.summarize("hello").await,
            Err(GatewayError::EmptyResponse)
        ));
    }
}
