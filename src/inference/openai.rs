//! OpenAI-compatible chat completion client
//!
//! Works against any `/chat/completions` endpoint (OpenRouter by default).
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::Settings;
use crate::error::{InferenceError, MarketEdgeError};
use crate::inference::InferenceClient;
use crate::models::ModelParams;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Reusable completion client (connection-pooled)
pub struct OpenAiCompatibleClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> crate::Result<Self> {
        if api_key.trim().is_empty() {
            return Err(MarketEdgeError::Config("inference API key is empty".to_string()));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()
            .map_err(|e| MarketEdgeError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let api_key = settings.require_api_key()?.to_string();
        Self::new(api_key, settings.base_url.clone(), settings.timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl InferenceClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        prompt: &str,
        params: &ModelParams,
    ) -> std::result::Result<String, InferenceError> {
        let request = ChatRequest {
            model: &params.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!(model = %params.model, prompt_len = prompt.len(), "Calling completion endpoint");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                InferenceError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            error!(status = status.as_u16(), "Completion endpoint returned an error");
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        extract_completion(&body)
    }
}

/// Upstream error bodies end up in user-visible messages; keep them short
fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Pull the first choice's message text out of a response body
fn extract_completion(body: &str) -> std::result::Result<String, InferenceError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| InferenceError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::MalformedResponse("no choices returned".to_string()))?
        .message
        .content
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(InferenceError::MalformedResponse(
            "empty completion text".to_string(),
        ));
    }

    Ok(content)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "google/gemini-2.0-flash-001",
            messages: vec![ChatMessage {
                role: "user",
                content: "Analyze SPY",
            }],
            temperature: 0.3,
            max_tokens: 1000,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Analyze SPY");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_error_body_is_truncated() {
        assert_eq!(truncate_body(" rate limited \n"), "rate limited");

        let page = "é".repeat(MAX_ERROR_BODY_CHARS + 50);
        let cut = truncate_body(&page);
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_extract_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Bullish"}}]}"#;
        assert_eq!(extract_completion(body).unwrap(), "Bullish");
    }

    #[test]
    fn test_extract_completion_rejects_malformed_bodies() {
        assert!(matches!(
            extract_completion("not json"),
            Err(InferenceError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_completion(r#"{"choices":[]}"#),
            Err(InferenceError::MalformedResponse(_))
        ));
        assert!(matches!(
            extract_completion(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(InferenceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let result = OpenAiCompatibleClient::new(
            String::new(),
            "http://localhost".to_string(),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }
}
