// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted text-generation backend for deterministic testing.
//!
//! `MockBackend` implements `CompletionBackend` by popping pre-configured
//! outcomes from a FIFO script. When the script is empty the default outcome
//! is used, so a backend can be set to "always fail" with one call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use handoff_core::{CompletionBackend, CompletionRequest, HandoffError};

/// One scripted outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Succeed with this text.
    Text(String),
    /// Fail with a provider error carrying this message.
    Fail(String),
    /// Succeed after sleeping; long enough delays trip the request timeout.
    Delayed(Duration, String),
}

/// A backend that replays scripted outcomes and records every request.
pub struct MockBackend {
    name: String,
    script: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<MockReply>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl MockBackend {
    /// A backend answering "mock response" to everything.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_default(name, MockReply::Text("mock response".to_string()))
    }

    /// A backend whose every call fails.
    pub fn failing(name: impl Into<String>) -> Self {
        Self::with_default(name, MockReply::Fail("mock backend unavailable".to_string()))
    }

    pub fn with_default(name: impl Into<String>, reply: MockReply) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(reply),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A backend that replays `replies` in order, then says "mock response".
    pub fn with_replies(name: impl Into<String>, replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(replies)),
            ..Self::new(name)
        }
    }

    /// Queues an outcome behind any already scripted.
    pub async fn push(&self, reply: MockReply) {
        self.script.lock().await.push_back(reply);
    }

    /// Replaces the outcome used once the script runs out.
    pub async fn set_default(&self, reply: MockReply) {
        *self.fallback.lock().await = reply;
    }

    /// Number of `complete` calls so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_reply(&self) -> MockReply {
        if let Some(reply) = self.script.lock().await.pop_front() {
            return reply;
        }
        self.fallback.lock().await.clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, HandoffError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());

        match self.next_reply().await {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(message) => Err(HandoffError::Provider {
                message,
                source: None,
            }),
            MockReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "hi".into(),
            history: Vec::new(),
            language: "en".into(),
        }
    }

    #[tokio::test]
    async fn replays_script_then_default() {
        let backend = MockBackend::with_replies(
            "m",
            vec![
                MockReply::Fail("boom".into()),
                MockReply::Text("first".into()),
            ],
        );
        assert!(backend.complete(&request()).await.is_err());
        assert_eq!(backend.complete(&request()).await.unwrap(), "first");
        assert_eq!(backend.complete(&request()).await.unwrap(), "mock response");
        assert_eq!(backend.calls(), 3);
        assert_eq!(backend.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn failing_backend_always_fails() {
        let backend = MockBackend::failing("down");
        for _ in 0..3 {
            assert!(backend.complete(&request()).await.is_err());
        }
        backend.set_default(MockReply::Text("back".into())).await;
        assert_eq!(backend.complete(&request()).await.unwrap(), "back");
    }
}
