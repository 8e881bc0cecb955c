// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response generation across prioritized backends.

use std::sync::Arc;
use std::time::Duration;

use handoff_config::{BackendConfig, ProvidersConfig};
use handoff_core::{CompletionBackend, CompletionRequest, HandoffError};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::circuit_breaker::{Admission, BreakerSnapshot, CircuitBreakerRegistry};

/// Outcome of [`ResponseProvider::generate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedResponse {
    pub text: String,
    pub confidence: f32,
    /// Set when every backend was exhausted and a human should take over.
    pub should_handoff: bool,
    pub processing_time_ms: u64,
    /// Backend that produced the text, `None` for the fallback message.
    pub provider: Option<String>,
}

/// How the provider treats one backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendPolicy {
    pub enabled: bool,
    /// Attempts per `generate` call, at least 1.
    pub max_retries: u32,
    pub confidence: f32,
}

impl Default for BackendPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            confidence: 0.8,
        }
    }
}

impl From<&BackendConfig> for BackendPolicy {
    fn from(config: &BackendConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_retries: config.max_retries,
            confidence: config.confidence,
        }
    }
}

struct Slot {
    backend: Arc<dyn CompletionBackend>,
    policy: BackendPolicy,
}

/// Generates replies from the first healthy backend, in priority order.
pub struct ResponseProvider {
    slots: Vec<Slot>,
    breakers: Arc<CircuitBreakerRegistry>,
    request_timeout: Duration,
    fallback_message: String,
}

impl ResponseProvider {
    pub fn new(
        breakers: Arc<CircuitBreakerRegistry>,
        request_timeout: Duration,
        fallback_message: impl Into<String>,
    ) -> Self {
        Self {
            slots: Vec::new(),
            breakers,
            request_timeout,
            fallback_message: fallback_message.into(),
        }
    }

    /// Builds a provider with a fresh breaker registry from the `[providers]`
    /// section. Backends are added separately with [`with_backend`](Self::with_backend).
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self::new(
            Arc::new(CircuitBreakerRegistry::new(
                config.failure_threshold,
                config.reset_timeout(),
            )),
            config.request_timeout(),
            config.fallback_message.clone(),
        )
    }

    /// Appends a backend at the lowest priority so far.
    pub fn with_backend(mut self, backend: Arc<dyn CompletionBackend>, policy: BackendPolicy) -> Self {
        self.slots.push(Slot { backend, policy });
        self
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn breaker_snapshot(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshot()
    }

    /// Names of the registered backends, in priority order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.backend.name()).collect()
    }

    /// Produces a reply; never fails.
    pub async fn generate(&self, request: &CompletionRequest) -> GeneratedResponse {
        let started = Instant::now();

        for slot in &self.slots {
            let name = slot.backend.name();
            if !slot.policy.enabled {
                debug!(backend = name, "backend disabled, skipping");
                continue;
            }
            if let Some(text) = self.try_backend(slot, request).await {
                return GeneratedResponse {
                    text,
                    confidence: slot.policy.confidence,
                    should_handoff: false,
                    processing_time_ms: elapsed_ms(started),
                    provider: Some(name.to_string()),
                };
            }
        }

        error!(
            backends = self.slots.len(),
            "all backends exhausted, falling back to human handoff"
        );
        GeneratedResponse {
            text: self.fallback_message.clone(),
            confidence: 0.0,
            should_handoff: true,
            processing_time_ms: elapsed_ms(started),
            provider: None,
        }
    }

    /// Runs the retry loop for one backend behind its breaker.
    async fn try_backend(&self, slot: &Slot, request: &CompletionRequest) -> Option<String> {
        let name = slot.backend.name();
        let max_attempts = slot.policy.max_retries.max(1);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let backoff = Duration::from_secs(1 << (attempt - 2).min(6));
                warn!(backend = name, attempt, backoff_secs = backoff.as_secs(), "retrying backend");
                tokio::time::sleep(backoff).await;
            }

            let admission = self.breakers.try_acquire(name);
            if admission == Admission::Rejected {
                debug!(backend = name, "circuit open, skipping backend");
                return None;
            }

            let trial = (admission == Admission::Trial).then(|| self.breakers.guard_trial(name));
            match self.call(slot, request).await {
                Ok(text) => {
                    self.breakers.record_success(name);
                    if let Some(trial) = trial {
                        trial.settle();
                    }
                    return Some(text);
                }
                Err(e) => {
                    warn!(backend = name, attempt, error = %e, "backend call failed");
                    self.breakers.record_failure(name);
                    if let Some(trial) = trial {
                        // Half-open allows exactly one call.
                        trial.settle();
                        return None;
                    }
                }
            }
        }
        None
    }

    async fn call(&self, slot: &Slot, request: &CompletionRequest) -> Result<String, HandoffError> {
        match tokio::time::timeout(self.request_timeout, slot.backend.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(HandoffError::Timeout {
                duration: self.request_timeout,
            }),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
