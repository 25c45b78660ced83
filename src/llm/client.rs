//! HTTP client for OpenAI-compatible chat completion APIs
//!
//! The client is deliberately forgiving: without an API key it reports
//! itself unavailable, and every request failure maps to a canned
//! user-facing sentence plus an error tag instead of an error value. The
//! agent only calls `chat` after checking `available`, so the unavailable
//! reply inside `chat` is a safety net.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::metrics;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONNECTION_TROUBLE_REPLY: &str =
    "Sorry, I'm unable to connect to the AI service right now. Please try again later.";
const TIMEOUT_REPLY: &str =
    "The AI service is taking too long to respond. Please try again later.";
const AUTH_TROUBLE_REPLY: &str =
    "There's an issue with the AI service configuration. Please contact support.";
const API_TROUBLE_REPLY: &str =
    "Sorry, I'm experiencing technical difficulties. Please try again later.";

/// Reply from `chat`. `error` carries a category tag when the text is one
/// of the canned failure sentences rather than model output.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub text: String,
    pub error: Option<String>,
}

impl LlmReply {
    fn failure(text: &str, tag: &str) -> Self {
        metrics::LLM_REQUESTS_TOTAL.with_label_values(&[tag]).inc();
        Self {
            text: text.to_string(),
            error: Some(tag.to_string()),
        }
    }
}

pub struct LlmClient {
    http: Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(
        api_key: Option<String>,
        api_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()),
            api_url: api_url.into(),
            model: model.into(),
            timeout,
        }
    }

    /// Build a client from `LLM_API_KEY`, `LLM_API_URL`, `LLM_MODEL`, and
    /// `LLM_TIMEOUT_SECS`. A missing key is not an error; the client just
    /// reports itself unavailable so chat falls back to canned replies.
    pub fn from_env() -> Self {
        let api_key = std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!("LLM_API_KEY is not set, chat will use canned fallback replies");
        }
        let api_url =
            std::env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_key, api_url, model, Duration::from_secs(timeout_secs))
    }

    /// A client with no credentials that always reports unavailable.
    pub fn disabled() -> Self {
        Self::new(
            None,
            DEFAULT_API_URL,
            DEFAULT_MODEL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send one prompt and return the model's reply. Never fails: transport
    /// and API problems come back as canned text with an error tag.
    pub async fn chat(&self, prompt: &str) -> LlmReply {
        let Some(api_key) = &self.api_key else {
            return LlmReply::failure(API_TROUBLE_REPLY, "llm_unavailable");
        };

        let started = Instant::now();
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            max_tokens: 500,
            temperature: 0.7,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .timeout(self.timeout)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "LLM request failed");
                return if err.is_connect() {
                    LlmReply::failure(CONNECTION_TROUBLE_REPLY, "connection_error")
                } else if err.is_timeout() {
                    LlmReply::failure(TIMEOUT_REPLY, "timeout_error")
                } else {
                    LlmReply::failure(API_TROUBLE_REPLY, "api_error")
                };
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::error!(status = %status, "LLM API rejected credentials");
            return LlmReply::failure(AUTH_TROUBLE_REPLY, "auth_error");
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "LLM API error");
            return LlmReply::failure(API_TROUBLE_REPLY, "api_error");
        }

        let completion: ChatCompletionResponse = match response.json().await {
            Ok(completion) => completion,
            Err(err) => {
                tracing::error!(error = %err, "Failed to decode LLM response");
                return LlmReply::failure(API_TROUBLE_REPLY, "api_error");
            }
        };

        let Some(text) = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
        else {
            tracing::error!("LLM response contained no choices");
            return LlmReply::failure(API_TROUBLE_REPLY, "api_error");
        };

        metrics::LLM_REQUESTS_TOTAL
            .with_label_values(&["success"])
            .inc();
        metrics::LLM_REQUEST_DURATION.observe(started.elapsed().as_secs_f64());

        LlmReply { text, error: None }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_availability() {
        assert!(!LlmClient::disabled().available());

        let configured = LlmClient::new(
            Some("test-key".to_string()),
            "https://api.example.com",
            "test-model",
            Duration::from_secs(5),
        );
        assert!(configured.available());

        // An empty key counts as absent.
        let empty = LlmClient::new(
            Some(String::new()),
            "https://api.example.com",
            "test-model",
            Duration::from_secs(5),
        );
        assert!(!empty.available());
    }

    #[tokio::test]
    async fn test_chat_without_key_uses_canned_reply() {
        let reply = LlmClient::disabled().chat("hello").await;
        assert_eq!(reply.text, API_TROUBLE_REPLY);
        assert_eq!(reply.error.as_deref(), Some("llm_unavailable"));
    }

    #[tokio::test]
    async fn test_chat_connection_failure_uses_canned_reply() {
        // Nothing listens on this port, so the request fails to connect.
        let client = LlmClient::new(
            Some("test-key".to_string()),
            "http://127.0.0.1:9",
            "test-model",
            Duration::from_secs(2),
        );

        let reply = client.chat("hello").await;
        assert_eq!(reply.text, CONNECTION_TROUBLE_REPLY);
        assert_eq!(reply.error.as_deref(), Some("connection_error"));
    }
}
