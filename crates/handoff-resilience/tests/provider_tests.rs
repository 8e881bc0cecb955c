// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback, retry, and circuit-breaker behavior of the response provider.

use std::sync::Arc;
use std::time::Duration;

use handoff_core::CompletionRequest;
use handoff_resilience::{BackendPolicy, CircuitBreakerRegistry, CircuitState, ResponseProvider};
use handoff_test_utils::{MockBackend, MockReply};

const FALLBACK: &str = "Sorry, connecting you with a person.";

fn request() -> CompletionRequest {
    CompletionRequest {
        prompt: "where is my permit?".into(),
        history: Vec::new(),
        language: "en".into(),
    }
}

fn policy(max_retries: u32) -> BackendPolicy {
    BackendPolicy {
        max_retries,
        ..BackendPolicy::default()
    }
}

fn provider(threshold: u32) -> ResponseProvider {
    ResponseProvider::new(
        Arc::new(CircuitBreakerRegistry::new(threshold, Duration::from_secs(60))),
        Duration::from_secs(30),
        FALLBACK,
    )
}

/// Five straight primary failures open its breaker; the next call within
/// 60 s skips it; after 60 s exactly one half-open trial reaches it.
#[tokio::test(start_paused = true)]
async fn primary_breaker_opens_skips_and_trials_once() {
    let primary = Arc::new(MockBackend::failing("primary"));
    let secondary = Arc::new(MockBackend::with_default(
        "secondary",
        MockReply::Text("from secondary".into()),
    ));
    let provider = provider(5)
        .with_backend(primary.clone(), policy(1))
        .with_backend(secondary.clone(), policy(1));

    for _ in 0..5 {
        let reply = provider.generate(&request()).await;
        assert_eq!(reply.provider.as_deref(), Some("secondary"));
        assert!(!reply.should_handoff);
    }
    assert_eq!(primary.calls(), 5);
    assert_eq!(provider.breakers().state("primary"), CircuitState::Open);

    // Sixth call inside the cooldown never reaches the primary.
    tokio::time::advance(Duration::from_secs(30)).await;
    let reply = provider.generate(&request()).await;
    assert_eq!(reply.text, "from secondary");
    assert_eq!(primary.calls(), 5);

    // Cooldown over: one trial, which fails and reopens the breaker.
    tokio::time::advance(Duration::from_secs(30)).await;
    provider.generate(&request()).await;
    assert_eq!(primary.calls(), 6);
    assert_eq!(provider.breakers().state("primary"), CircuitState::Open);
    provider.generate(&request()).await;
    assert_eq!(primary.calls(), 6);

    // Next cooldown: the primary has recovered and the trial closes the breaker.
    tokio::time::advance(Duration::from_secs(60)).await;
    primary.set_default(MockReply::Text("from primary".into())).await;
    let reply = provider.generate(&request()).await;
    assert_eq!(reply.provider.as_deref(), Some("primary"));
    assert_eq!(provider.breakers().state("primary"), CircuitState::Closed);
    assert_eq!(provider.breakers().consecutive_failures("primary"), 0);
}

#[tokio::test(start_paused = true)]
async fn retries_with_exponential_backoff() {
    let primary = Arc::new(MockBackend::with_replies(
        "primary",
        vec![
            MockReply::Fail("503".into()),
            MockReply::Fail("503".into()),
            MockReply::Text("third time lucky".into()),
        ],
    ));
    let provider = provider(5).with_backend(primary.clone(), policy(3));

    let started = tokio::time::Instant::now();
    let reply = provider.generate(&request()).await;

    assert_eq!(reply.text, "third time lucky");
    assert_eq!(reply.confidence, 0.8);
    assert_eq!(primary.calls(), 3);
    // 1 s after the first failure, 2 s after the second.
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert!(reply.processing_time_ms >= 3000);
}

#[tokio::test(start_paused = true)]
async fn all_backends_exhausted_requests_handoff() {
    let provider = provider(5)
        .with_backend(Arc::new(MockBackend::failing("primary")), policy(2))
        .with_backend(Arc::new(MockBackend::failing("secondary")), policy(2));

    let reply = provider.generate(&request()).await;
    assert!(reply.should_handoff);
    assert_eq!(reply.text, FALLBACK);
    assert_eq!(reply.confidence, 0.0);
    assert!(reply.provider.is_none());
}

#[tokio::test(start_paused = true)]
async fn no_backends_means_handoff() {
    let reply = provider(5).generate(&request()).await;
    assert!(reply.should_handoff);
}

#[tokio::test(start_paused = true)]
async fn breaker_opening_mid_retry_stops_attempts() {
    let primary = Arc::new(MockBackend::failing("primary"));
    let provider = provider(2).with_backend(primary.clone(), policy(3));

    let reply = provider.generate(&request()).await;
    assert!(reply.should_handoff);
    assert_eq!(primary.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_backend_times_out_and_counts_as_failure() {
    let slow = Arc::new(MockBackend::with_default(
        "slow",
        MockReply::Delayed(Duration::from_secs(120), "too late".into()),
    ));
    let fast = Arc::new(MockBackend::new("fast"));
    let provider = provider(5)
        .with_backend(slow.clone(), policy(1))
        .with_backend(fast, policy(1));

    let reply = provider.generate(&request()).await;
    assert_eq!(reply.provider.as_deref(), Some("fast"));
    assert_eq!(provider.breakers().consecutive_failures("slow"), 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_backends_are_skipped() {
    let disabled = Arc::new(MockBackend::new("disabled"));
    let enabled = Arc::new(MockBackend::new("enabled"));
    let provider = provider(5)
        .with_backend(
            disabled.clone(),
            BackendPolicy {
                enabled: false,
                ..BackendPolicy::default()
            },
        )
        .with_backend(enabled, policy(1));

    let reply = provider.generate(&request()).await;
    assert_eq!(reply.provider.as_deref(), Some("enabled"));
    assert_eq!(disabled.calls(), 0);
    assert_eq!(provider.backend_names(), vec!["disabled", "enabled"]);
}

#[tokio::test(start_paused = true)]
async fn snapshot_reports_open_breaker() {
    let provider = provider(1).with_backend(Arc::new(MockBackend::failing("primary")), policy(1));
    provider.generate(&request()).await;

    let snapshot = provider.breaker_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].state, CircuitState::Open);
    assert_eq!(snapshot[0].consecutive_failures, 1);
}

/// A caller that gives up during the half-open trial must not wedge the
/// breaker: it reopens and the next cooldown grants a fresh trial.
#[tokio::test(start_paused = true)]
async fn cancelled_trial_reopens_breaker() {
    let primary = Arc::new(MockBackend::with_replies(
        "primary",
        vec![
            MockReply::Fail("503".into()),
            MockReply::Delayed(Duration::from_secs(10), "too late".into()),
        ],
    ));
    let provider = provider(1).with_backend(primary.clone(), policy(1));

    let reply = provider.generate(&request()).await;
    assert!(reply.should_handoff);
    assert_eq!(provider.breakers().state("primary"), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(61)).await;
    let abandoned = tokio::time::timeout(Duration::from_secs(1), provider.generate(&request())).await;
    assert!(abandoned.is_err());
    assert_eq!(primary.calls(), 2);
    assert_eq!(provider.breakers().state("primary"), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(61)).await;
    let reply = provider.generate(&request()).await;
    assert_eq!(reply.provider.as_deref(), Some("primary"));
    assert_eq!(reply.text, "mock response");
    assert_eq!(primary.calls(), 3);
    assert_eq!(provider.breakers().state("primary"), CircuitState::Closed);
}
