// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero window sizes, ordered SLA deadlines, and unique backend names.

use std::collections::HashSet;

use handoff_core::PriorityLevel;
use tracing::warn;

use crate::diagnostic::ConfigError;
use crate::model::HandoffConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HandoffConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let rl = &config.rate_limit;
    if rl.short_window_requests == 0 || rl.long_window_requests == 0 {
        fail("rate_limit window request limits must be greater than zero".to_string());
    }
    if rl.short_window_secs == 0 || rl.long_window_secs == 0 {
        fail("rate_limit window lengths must be greater than zero".to_string());
    }
    if rl.short_window_secs >= rl.long_window_secs {
        fail(format!(
            "rate_limit.short_window_secs ({}) must be shorter than rate_limit.long_window_secs ({})",
            rl.short_window_secs, rl.long_window_secs
        ));
    }

    if config.queue.capacity == 0 {
        fail("queue.capacity must be greater than zero".to_string());
    }
    if config.queue.batch_size == 0 {
        fail("queue.batch_size must be greater than zero".to_string());
    }

    if config.session.max_turns == 0 {
        fail("session.max_turns must be greater than zero".to_string());
    }
    if config.session.ttl_secs == 0 {
        fail("session.ttl_secs must be greater than zero".to_string());
    }
    if config.session.sweep_interval_secs == 0 {
        fail("session.sweep_interval_secs must be greater than zero".to_string());
    }

    let providers = &config.providers;
    if providers.failure_threshold == 0 {
        fail("providers.failure_threshold must be greater than zero".to_string());
    }
    if providers.request_timeout_secs == 0 {
        fail("providers.request_timeout_secs must be greater than zero".to_string());
    }
    if providers.fallback_message.trim().is_empty() {
        fail("providers.fallback_message must not be empty".to_string());
    }

    let mut seen = HashSet::new();
    for backend in &providers.backends {
        let name = backend.name.trim();
        if name.is_empty() {
            fail("providers.backends entries must have a non-empty name".to_string());
            continue;
        }
        if !seen.insert(name) {
            fail(format!("duplicate backend name `{name}` in providers.backends"));
        }
        if backend.max_retries == 0 {
            fail(format!("backend `{name}`: max_retries must be at least 1"));
        }
        if !(0.0..=1.0).contains(&backend.confidence) {
            fail(format!(
                "backend `{name}`: confidence must be between 0.0 and 1.0, got {}",
                backend.confidence
            ));
        }
        if backend.base_url.trim().is_empty() {
            fail(format!("backend `{name}`: base_url must not be empty"));
        }
    }

    let sla = &config.sla;
    if !(sla.warning_fraction > 0.0 && sla.warning_fraction < 1.0) {
        fail(format!(
            "sla.warning_fraction must be between 0 and 1 (exclusive), got {}",
            sla.warning_fraction
        ));
    }
    for level in PriorityLevel::all() {
        let target = sla.target(level);
        let key = level.to_string().to_lowercase();
        if target.response_minutes == 0 {
            fail(format!("sla.{key}.response_minutes must be greater than zero"));
        }
        if target.response_minutes > target.resolution_minutes {
            fail(format!(
                "sla.{key}: response_minutes ({}) must not exceed resolution_minutes ({})",
                target.response_minutes, target.resolution_minutes
            ));
        }
    }

    for (key, value) in [
        ("handoff.request_priority", config.handoff.request_priority),
        (
            "handoff.provider_failure_priority",
            config.handoff.provider_failure_priority,
        ),
    ] {
        if !(1..=5).contains(&value) {
            fail(format!("{key} must be between 1 and 5, got {value}"));
        }
    }
    if config.handoff.phrases.iter().any(|p| p.trim().is_empty()) {
        fail("handoff.phrases must not contain empty phrases".to_string());
    }

    warn_on_unusable_setup(config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Settings that are legal but leave part of the engine idle.
fn warn_on_unusable_setup(config: &HandoffConfig) {
    if config.agents.authorized.is_empty() && config.agents.supervisors.is_empty() {
        warn!("agent roster is empty, no agent can take tickets");
    }
    if config.providers.backends.iter().all(|b| !b.enabled) {
        warn!("no enabled backends, every question will receive the fallback reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BackendConfig;

    fn backend(name: &str) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            enabled: true,
            base_url: "http://localhost".to_string(),
            api_key: None,
            model: "m".to_string(),
            max_retries: 3,
            confidence: 0.8,
            max_tokens: 64,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&HandoffConfig::default()).is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = HandoffConfig::default();
        config.queue.capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("queue.capacity"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = HandoffConfig::default();
        config.queue.batch_size = 0;
        config.providers.failure_threshold = 0;
        config.handoff.request_priority = 9;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn sla_response_must_not_exceed_resolution() {
        let mut config = HandoffConfig::default();
        config.sla.high.response_minutes = 120;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("sla.high"));
    }

    #[test]
    fn warning_fraction_bounds() {
        let mut config = HandoffConfig::default();
        config.sla.warning_fraction = 1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn duplicate_backend_names_rejected() {
        let mut config = HandoffConfig::default();
        config.providers.backends = vec![backend("primary"), backend("primary")];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("duplicate backend name"));
    }

    #[test]
    fn toml_backend_list_is_validated() {
        let config: HandoffConfig = toml::from_str(
            r#"
            [[providers.backends]]
            name = "primary"
            max_retries = 0

            [[providers.backends]]
            name = "secondary"
            "#,
        )
        .unwrap();
        assert_eq!(config.providers.backends[1].max_retries, 3);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("max_retries"));
    }

    #[test]
    fn backend_confidence_bounds() {
        let mut config = HandoffConfig::default();
        let mut b = backend("primary");
        b.confidence = 1.5;
        config.providers.backends = vec![b];
        assert!(validate_config(&config).is_err());
    }
}
