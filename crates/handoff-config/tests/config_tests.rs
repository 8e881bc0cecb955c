// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Handoff configuration system.

use handoff_config::diagnostic::ConfigError;
use handoff_config::model::HandoffConfig;
use handoff_config::{load_and_validate_str, load_config, load_config_from_str};
use handoff_core::PriorityLevel;

/// An empty file yields the production defaults.
#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.rate_limit.short_window_requests, 10);
    assert_eq!(config.rate_limit.short_window_secs, 60);
    assert_eq!(config.rate_limit.long_window_requests, 100);
    assert_eq!(config.rate_limit.long_window_secs, 3600);
    assert_eq!(config.queue.capacity, 1000);
    assert_eq!(config.session.ttl_secs, 1800);
    assert_eq!(config.session.max_turns, 10);
    assert_eq!(config.session.context_token_budget, 2000);
    assert_eq!(config.providers.failure_threshold, 5);
    assert_eq!(config.providers.reset_timeout_secs, 60);
    assert!(config.providers.backends.is_empty());
}

#[test]
fn sla_table_defaults() {
    let config = HandoffConfig::default();
    let cases = [
        (PriorityLevel::Emergency, 2, 15),
        (PriorityLevel::High, 5, 60),
        (PriorityLevel::Medium, 15, 240),
        (PriorityLevel::Low, 30, 480),
    ];
    for (level, response, resolution) in cases {
        let target = config.sla.target(level);
        assert_eq!(target.response_minutes, response, "{level}");
        assert_eq!(target.resolution_minutes, resolution, "{level}");
    }
}

/// A full file with backends deserializes successfully.
#[test]
fn valid_toml_deserializes_into_handoff_config() {
    let toml = r#"
[service]
log_level = "debug"

[rate_limit]
short_window_requests = 3
bypass_users = ["ops"]

[queue]
capacity = 50

[providers]
failure_threshold = 2

[[providers.backends]]
name = "primary"
base_url = "http://localhost:8080/v1"
model = "small"

[[providers.backends]]
name = "secondary"
enabled = false
confidence = 0.6

[sla.high]
response_minutes = 3
resolution_minutes = 30

[agents]
authorized = ["alice", "bob"]
supervisors = ["carol"]
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.rate_limit.short_window_requests, 3);
    assert_eq!(config.rate_limit.bypass_users, vec!["ops"]);
    assert_eq!(config.queue.capacity, 50);
    assert_eq!(config.providers.failure_threshold, 2);
    assert_eq!(config.providers.backends.len(), 2);
    assert_eq!(config.providers.backends[0].name, "primary");
    assert_eq!(config.providers.backends[0].max_retries, 3);
    assert!(!config.providers.backends[1].enabled);
    assert_eq!(config.sla.high.response_minutes, 3);
    assert_eq!(config.sla.medium.response_minutes, 15);
    assert_eq!(config.agents.supervisors, vec!["carol"]);
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[queue]
capacty = 10
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "capacty");
            assert_eq!(suggestion.as_deref(), Some("capacity"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_rejected() {
    let toml = r#"
[telemetry]
enabled = true
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn wrong_type_reports_invalid_type() {
    let toml = r#"
[queue]
capacity = "lots"
"#;
    let errors = load_and_validate_str(toml).expect_err("type mismatch rejected");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn backend_without_name_reports_missing_key() {
    let toml = r#"
[[providers.backends]]
model = "x"
"#;
    let errors = load_and_validate_str(toml).expect_err("name is required");
    assert!(matches!(&errors[0], ConfigError::MissingKey { key } if key == "name"));
}

#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[queue]
capacity = 0

[sla]
warning_fraction = 2.0
"#;
    let errors = load_and_validate_str(toml).expect_err("invalid values");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "handoff.toml",
            r#"
[queue]
capacity = 20

[rate_limit]
short_window_requests = 4
"#,
        )?;
        jail.set_env("HANDOFF_QUEUE_CAPACITY", 7);
        jail.set_env("HANDOFF_SESSION_MAX_TURNS", 4);

        let config = load_config()?;
        assert_eq!(config.queue.capacity, 7);
        assert_eq!(config.rate_limit.short_window_requests, 4);
        assert_eq!(config.session.max_turns, 4);
        Ok(())
    });
}
