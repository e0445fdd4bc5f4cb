//! Chat-completion client that turns requirements text into an epic/story tree.

use std::time::Instant;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::LlmConfig;
use super::decode::decode_analysis;
use super::prompt::user_message;
use super::retry;
use crate::error::{AiServiceError, ConfigError, StructuringError};
use crate::pipeline::types::AnalysisResult;

/// Anything that can structure requirements text.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult, StructuringError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

/// Client for an OpenAI-style `/chat/completions` endpoint.
pub struct StructuringClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl StructuringClient {
    /// Build the client. The configured timeout applies to every attempt and
    /// aborts the underlying connection when it fires.
    pub fn new(config: LlmConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn build_request<'a>(&'a self, text: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.config.system_prompt.as_str().into(),
                },
                ChatMessage {
                    role: "user",
                    content: user_message(text).into(),
                },
            ],
        }
    }

    /// POST the request and return the message content.
    ///
    /// Sending and reading the body are one retried unit, so a timeout while
    /// the body streams counts as a transport failure like any other.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, AiServiceError> {
        let started = Instant::now();

        let (status, bytes) = retry::run(&self.config.retry, |attempt| {
            let builder = self
                .http
                .post(&self.config.endpoint)
                .bearer_auth(self.config.api_key.expose_secret())
                .json(request);
            async move {
                debug!(attempt, "Sending generation request");
                let response = builder.send().await?;
                let status = response.status();
                let bytes = response.bytes().await?;
                Ok::<_, reqwest::Error>((status, bytes))
            }
        })
        .await
        .map_err(|exhausted| {
            warn!(
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "Generation endpoint unreachable"
            );
            if exhausted.last_error.is_timeout() {
                AiServiceError::Timeout {
                    attempts: exhausted.attempts,
                    timeout: self.config.timeout,
                }
            } else {
                AiServiceError::Transport {
                    attempts: exhausted.attempts,
                    reason: exhausted.last_error.to_string(),
                }
            }
        })?;

        info!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation response received"
        );

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            warn!(status = status.as_u16(), body = %body, "Generation endpoint returned an error");
            return Err(AiServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AiServiceError::InvalidBody(e.to_string()))?;

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(AiServiceError::MissingContent)?;

        debug!(chars = content.len(), "Extracted generation content");
        Ok(content.to_string())
    }
}

#[async_trait]
impl Analyzer for StructuringClient {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult, StructuringError> {
        info!(
            model = %self.config.model,
            chars = text.len(),
            "Requesting epic/story breakdown"
        );
        let request = self.build_request(text);
        let content = self.complete(&request).await?;
        let result = decode_analysis(&content)?;
        info!(
            epics = result.epics.len(),
            stories = result.story_count(),
            "AI analysis complete"
        );
        Ok(result)
    }
}
