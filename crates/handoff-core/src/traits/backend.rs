// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-generation backend trait (OpenAI-compatible APIs, local models, etc.).

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::types::CompletionRequest;

/// A text-generation backend the response provider can fall back across.
///
/// Any error returned from [`complete`](CompletionBackend::complete) is
/// counted as a failure by the circuit breaker guarding this backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync + 'static {
    /// Returns the stable name of this backend, used as the circuit breaker key.
    fn name(&self) -> &str;

    /// Generates a reply for the given prompt and history.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, HandoffError>;
}
