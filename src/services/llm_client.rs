//! LLM gateway: chat-completion calls against an OpenAI-compatible API.
//!
//! Each call is independent (no conversation memory) and uses a fixed low
//! temperature so repeated analyses of the same document stay comparable.
//! Failed calls are retried exactly once, with jitter, and only for
//! rate-limit/server-side/transport failures.

use anyhow::{Context, Result};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::error::ApiError;

/// Sampling temperature for every completion.
const TEMPERATURE: f32 = 0.1;

/// Output budget for a single-document analysis.
pub const ANALYSIS_MAX_TOKENS: u32 = 2000;

/// Output budget for a multi-document comparison.
pub const COMPARISON_MAX_TOKENS: u32 = 4000;

/// Raw completion returned by the provider.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub tokens_used: u32,
}

/// Gateway-level failures.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("provider returned a success status but no message content")]
    EmptyCompletion,

    #[error("request to provider failed: {0}")]
    Transport(String),
}

impl LlmError {
    /// Rate limits, server-side errors, and transport failures are worth one
    /// more attempt; other client errors are permanent.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
            Self::EmptyCompletion => false,
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Upstream { status, message } => ApiError::Upstream { status, message },
            LlmError::EmptyCompletion => ApiError::Upstream {
                status: 200,
                message: "réponse vide du modèle".to_string(),
            },
            LlmError::Transport(message) => ApiError::Upstream {
                status: 0,
                message,
            },
        }
    }
}

/// Client for the hosted chat-completion API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u32,
}

/// Error body shape of the provider: `{ "error": { "message": ... } }`.
#[derive(Deserialize)]
struct ProviderErrorBody {
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
struct ProviderError {
    message: Option<String>,
}

impl LlmClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, model = model, "LLM client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Send a system/user prompt pair and return the raw assistant text plus
    /// token usage.
    #[instrument(skip(self, system_prompt, user_prompt))]
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<Completion, ApiError> {
        match self.try_complete(system_prompt, user_prompt, max_tokens).await {
            Ok(completion) => Ok(completion),
            Err(e) if e.is_retryable() => {
                let mut policy = ExponentialBackoff {
                    initial_interval: Duration::from_millis(500),
                    ..ExponentialBackoff::default()
                };
                let delay = policy.next_backoff().unwrap_or(Duration::from_millis(500));
                warn!(error = %e, delay_ms = delay.as_millis() as u64, "Retrying LLM call once");
                tokio::time::sleep(delay).await;

                self.try_complete(system_prompt, user_prompt, max_tokens)
                    .await
                    .map_err(ApiError::from)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn try_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<Completion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens,
        };

        debug!(url = %url, max_tokens = max_tokens, "LLM request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "LLM request failed");
                LlmError::Transport(e.to_string())
            })?;

        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status));

            error!(status = %status, message = %message, "LLM provider error");
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("invalid provider response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)?;

        let tokens_used = body.usage.map(|u| u.total_tokens).unwrap_or(0);

        debug!(tokens_used = tokens_used, "LLM completion received");

        Ok(Completion {
            content,
            tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(LlmError::Upstream {
            status: 429,
            message: "slow down".into()
        }
        .is_retryable());
        assert!(LlmError::Upstream {
            status: 503,
            message: "overloaded".into()
        }
        .is_retryable());
        assert!(LlmError::Transport("connection reset".into()).is_retryable());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!LlmError::Upstream {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!LlmError::EmptyCompletion.is_retryable());
    }

    #[test]
    fn upstream_error_converts_with_status() {
        let api: ApiError = LlmError::Upstream {
            status: 429,
            message: "rate limit".into(),
        }
        .into();
        match api {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limit");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
