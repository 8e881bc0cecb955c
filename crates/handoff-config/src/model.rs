// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Handoff engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. Every value
//! has a compiled default matching the production policy, so an empty file
//! is a valid configuration.

use std::time::Duration;

use handoff_core::PriorityLevel;
use serde::{Deserialize, Serialize};

/// Top-level Handoff configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Per-user admission control.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Inbound message queue.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Conversation session store.
    #[serde(default)]
    pub session: SessionConfig,

    /// Text-generation backends and circuit breakers.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// SLA deadline table.
    #[serde(default)]
    pub sla: SlaConfig,

    /// Handoff decision policy.
    #[serde(default)]
    pub handoff: HandoffPolicyConfig,

    /// Agent roster.
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "handoff".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Sliding-window rate limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests allowed in the short window.
    #[serde(default = "default_short_window_requests")]
    pub short_window_requests: u32,

    /// Length of the short window in seconds.
    #[serde(default = "default_short_window_secs")]
    pub short_window_secs: u64,

    /// Requests allowed in the long window.
    #[serde(default = "default_long_window_requests")]
    pub long_window_requests: u32,

    /// Length of the long window in seconds.
    #[serde(default = "default_long_window_secs")]
    pub long_window_secs: u64,

    /// Users exempt from rate limiting.
    #[serde(default)]
    pub bypass_users: Vec<String>,

    /// Maximum number of rejections kept in the audit log.
    #[serde(default = "default_violation_log_size")]
    pub violation_log_size: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            short_window_requests: default_short_window_requests(),
            short_window_secs: default_short_window_secs(),
            long_window_requests: default_long_window_requests(),
            long_window_secs: default_long_window_secs(),
            bypass_users: Vec::new(),
            violation_log_size: default_violation_log_size(),
        }
    }
}

fn default_short_window_requests() -> u32 {
    10
}

fn default_short_window_secs() -> u64 {
    60
}

fn default_long_window_requests() -> u32 {
    100
}

fn default_long_window_secs() -> u64 {
    3600
}

fn default_violation_log_size() -> usize {
    1000
}

/// Inbound queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum number of pending messages.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Messages drained per processing pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_batch_size() -> usize {
    10
}

/// Conversation session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Idle time after which a session expires.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,

    /// Turns retained per session.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Token budget for history passed to the backends.
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,

    /// How often the background sweeper purges expired sessions.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            max_turns: default_max_turns(),
            context_token_budget: default_context_token_budget(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    30 * 60
}

fn default_max_turns() -> usize {
    10
}

fn default_context_token_budget() -> usize {
    2000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Text-generation backends and the circuit breakers guarding them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Consecutive failures before a breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds an open breaker waits before allowing a half-open trial.
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,

    /// Upper bound on a single backend call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reply sent to the user when every backend is exhausted.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Backends in priority order (primary first).
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl ProvidersConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            fallback_message: default_fallback_message(),
            backends: Vec::new(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_fallback_message() -> String {
    "I'm sorry, I'm having trouble answering right now. \
     Let me connect you with a member of our support team."
        .to_string()
}

/// One text-generation backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Unique name, used as the circuit breaker key.
    pub name: String,

    /// Whether the backend is tried at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. `None` sends no authorization header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier passed to the API.
    #[serde(default = "default_backend_model")]
    pub model: String,

    /// Attempts per `generate` call before moving to the next backend.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Confidence reported for replies from this backend.
    #[serde(default = "default_confidence")]
    pub confidence: f32,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_backend_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_confidence() -> f32 {
    0.8
}

fn default_max_tokens() -> u32 {
    512
}

/// Response and resolution minutes for one priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlaTarget {
    pub response_minutes: u32,
    pub resolution_minutes: u32,
}

impl SlaTarget {
    pub fn response(&self) -> Duration {
        Duration::from_secs(u64::from(self.response_minutes) * 60)
    }

    pub fn resolution(&self) -> Duration {
        Duration::from_secs(u64::from(self.resolution_minutes) * 60)
    }
}

/// SLA deadline table keyed by priority tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlaConfig {
    /// Fraction of the response deadline at which the warning fires.
    #[serde(default = "default_warning_fraction")]
    pub warning_fraction: f64,

    #[serde(default = "default_sla_emergency")]
    pub emergency: SlaTarget,

    #[serde(default = "default_sla_high")]
    pub high: SlaTarget,

    #[serde(default = "default_sla_medium")]
    pub medium: SlaTarget,

    #[serde(default = "default_sla_low")]
    pub low: SlaTarget,
}

impl SlaConfig {
    /// Looks up the target for a priority tier.
    pub fn target(&self, level: PriorityLevel) -> SlaTarget {
        match level {
            PriorityLevel::Emergency => self.emergency,
            PriorityLevel::High => self.high,
            PriorityLevel::Medium => self.medium,
            PriorityLevel::Low => self.low,
        }
    }
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            warning_fraction: default_warning_fraction(),
            emergency: default_sla_emergency(),
            high: default_sla_high(),
            medium: default_sla_medium(),
            low: default_sla_low(),
        }
    }
}

fn default_warning_fraction() -> f64 {
    0.8
}

fn default_sla_emergency() -> SlaTarget {
    SlaTarget {
        response_minutes: 2,
        resolution_minutes: 15,
    }
}

fn default_sla_high() -> SlaTarget {
    SlaTarget {
        response_minutes: 5,
        resolution_minutes: 60,
    }
}

fn default_sla_medium() -> SlaTarget {
    SlaTarget {
        response_minutes: 15,
        resolution_minutes: 240,
    }
}

fn default_sla_low() -> SlaTarget {
    SlaTarget {
        response_minutes: 30,
        resolution_minutes: 480,
    }
}

/// Phrases and defaults driving the AI-vs-human decision.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffPolicyConfig {
    /// Case-insensitive phrases that request a human agent.
    #[serde(default = "default_handoff_phrases")]
    pub phrases: Vec<String>,

    /// Case-insensitive utterances that reset the conversation context.
    #[serde(default = "default_reset_phrases")]
    pub reset_phrases: Vec<String>,

    /// Priority for tickets the user explicitly requested.
    #[serde(default = "default_request_priority")]
    pub request_priority: u8,

    /// Priority for tickets created because every backend failed.
    #[serde(default = "default_provider_failure_priority")]
    pub provider_failure_priority: u8,
}

impl Default for HandoffPolicyConfig {
    fn default() -> Self {
        Self {
            phrases: default_handoff_phrases(),
            reset_phrases: default_reset_phrases(),
            request_priority: default_request_priority(),
            provider_failure_priority: default_provider_failure_priority(),
        }
    }
}

fn default_handoff_phrases() -> Vec<String> {
    [
        "talk to a human",
        "speak to a human",
        "human agent",
        "real person",
        "talk to an agent",
        "speak to an agent",
        "speak to someone",
        "customer service",
        "representative",
        "live agent",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_reset_phrases() -> Vec<String> {
    ["reset", "start over", "new conversation", "clear chat"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_request_priority() -> u8 {
    handoff_core::DEFAULT_PRIORITY
}

fn default_provider_failure_priority() -> u8 {
    handoff_core::DEFAULT_PRIORITY
}

/// Agent roster.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentsConfig {
    /// Agents allowed to take tickets.
    #[serde(default)]
    pub authorized: Vec<String>,

    /// Supervisors notified of SLA warnings and breaches.
    #[serde(default)]
    pub supervisors: Vec<String>,
}
