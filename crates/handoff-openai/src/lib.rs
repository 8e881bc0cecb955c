// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat-completions backend.
//!
//! [`OpenAiBackend`] implements [`CompletionBackend`] against any API that
//! speaks `POST /chat/completions` (OpenAI, Azure-style gateways, local
//! servers such as vLLM or Ollama's compatibility layer). It makes exactly
//! one HTTP request per call; retries, backoff and circuit breaking belong
//! to the response provider.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use handoff_config::BackendConfig;
use handoff_core::{CompletionBackend, CompletionRequest, HandoffError, Role};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse};

/// Transport-level ceiling; the provider applies its own, usually shorter, timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client bound to one configured backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, HandoffError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                HandoffError::Config(format!(
                    "invalid API key for backend `{}`: {e}",
                    config.name
                ))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| HandoffError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            name: config.name.clone(),
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::new(
            "system",
            format!(
                "You are a citizen-support assistant. Reply in the language with code `{}`.",
                request.language
            ),
        ));
        for turn in &request.history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            messages.push(ChatMessage::new(role, turn.text.clone()));
        }
        messages.push(ChatMessage::new("user", request.prompt.clone()));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, HandoffError> {
        let body = self.build_request(request);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| HandoffError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(backend = %self.name, status = %status, "chat completion response received");

        let text = response.text().await.map_err(|e| HandoffError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!(
                    "API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {text}"),
            };
            return Err(HandoffError::Provider {
                message,
                source: None,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| HandoffError::Provider {
                message: format!("failed to parse API response: {e}"),
                source: Some(Box::new(e)),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| HandoffError::Provider {
                message: "API response contained no text".into(),
                source: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::Turn;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, api_key: Option<&str>) -> BackendConfig {
        BackendConfig {
            name: "primary".into(),
            enabled: true,
            base_url: base_url.to_string(),
            api_key: api_key.map(String::from),
            model: "test-model".into(),
            max_retries: 3,
            confidence: 0.8,
            max_tokens: 128,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "How do I renew my permit?".into(),
            history: vec![Turn::user("hello"), Turn::assistant("Hi! How can I help?")],
            language: "en".into(),
        }
    }

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn endpoint_joins_base_url() {
        let backend = OpenAiBackend::new(&config("http://localhost:8000/v1/", None)).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn request_carries_history_then_prompt() {
        let backend = OpenAiBackend::new(&config("http://x", None)).unwrap();
        let body = backend.build_request(&request());
        let roles: Vec<&str> = body.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(body.messages[3].content, "How do I renew my permit?");
        assert_eq!(body.max_tokens, 128);
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("  Visit the portal. ")))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(&config(&server.uri(), Some("sk-test"))).unwrap();
        let text = backend.complete(&request()).await.unwrap();
        assert_eq!(text, "Visit the portal.");
    }

    #[tokio::test]
    async fn api_error_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_exceeded", "message": "slow down"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(&config(&server.uri(), None)).unwrap();
        let err = backend.complete(&request()).await.unwrap_err();
        assert!(matches!(err, HandoffError::Provider { .. }));
        assert!(err.to_string().contains("rate_limit_exceeded"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_choice_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(&config(&server.uri(), None)).unwrap();
        assert!(backend.complete(&request()).await.is_err());
    }

    #[tokio::test]
    async fn non_json_failure_includes_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(&config(&server.uri(), None)).unwrap();
        let err = backend.complete(&request()).await.unwrap_err().to_string();
        assert!(err.contains("502"), "got: {err}");
    }
}
