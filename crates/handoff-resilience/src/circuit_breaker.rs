// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-backend circuit breakers.
//!
//! A breaker counts consecutive failures of one backend. At the threshold it
//! *opens* and the backend is skipped until `reset_timeout` has passed. The
//! first call after that runs as a single *half-open* trial: success closes
//! the breaker, failure reopens it for another full timeout. A trial that
//! ends without an outcome (the caller was cancelled) counts as a failure.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker state for a single backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Healthy, calls allowed.
    Closed,
    /// Tripped, calls skipped until the reset timeout expires.
    Open,
    /// Reset timeout expired, one trial call allowed.
    HalfOpen,
}

/// Whether a call may go ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed.
    Allowed,
    /// This caller holds the single half-open trial.
    Trial,
    /// Skip the backend.
    Rejected,
}

/// Point-in-time view of one breaker, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub next_retry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<DateTime<Utc>>,
    next_retry: Option<Instant>,
    next_retry_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            next_retry: None,
            next_retry_at: None,
            trial_in_flight: false,
        }
    }
}

/// Process-wide map of breakers keyed by backend name.
///
/// Breakers are created closed on first use and never removed.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Breaker>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }

    /// Asks whether a call to `name` may proceed, moving an expired open
    /// breaker to half-open and handing out its single trial.
    pub fn try_acquire(&self, name: &str) -> Admission {
        let mut breaker = self.breakers.entry(name.to_string()).or_default();
        match breaker.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let ready = breaker.next_retry.is_none_or(|at| Instant::now() >= at);
                if ready {
                    breaker.state = CircuitState::HalfOpen;
                    breaker.trial_in_flight = true;
                    info!(backend = name, "circuit half-open, allowing one trial call");
                    Admission::Trial
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if breaker.trial_in_flight {
                    Admission::Rejected
                } else {
                    breaker.trial_in_flight = true;
                    Admission::Trial
                }
            }
        }
    }

    /// Records a successful call: the breaker closes and its count resets.
    pub fn record_success(&self, name: &str) {
        let mut breaker = self.breakers.entry(name.to_string()).or_default();
        if breaker.state != CircuitState::Closed {
            info!(backend = name, "circuit closed after successful call");
        }
        let last_failure = breaker.last_failure;
        *breaker = Breaker {
            last_failure,
            ..Breaker::default()
        };
    }

    /// Records a failed call, opening the breaker at the threshold or when a
    /// half-open trial fails.
    pub fn record_failure(&self, name: &str) {
        let mut breaker = self.breakers.entry(name.to_string()).or_default();
        breaker.consecutive_failures += 1;
        breaker.last_failure = Some(Utc::now());

        let trip = match breaker.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => breaker.consecutive_failures >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            breaker.state = CircuitState::Open;
            breaker.trial_in_flight = false;
            breaker.next_retry = Some(Instant::now() + self.reset_timeout);
            breaker.next_retry_at = Some(
                Utc::now()
                    + chrono::Duration::from_std(self.reset_timeout)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
            );
            warn!(
                backend = name,
                consecutive_failures = breaker.consecutive_failures,
                reset_timeout_secs = self.reset_timeout.as_secs(),
                "circuit opened"
            );
        }
    }

    /// Guards the half-open trial handed out by [`try_acquire`](Self::try_acquire).
    ///
    /// Dropping the guard before [`TrialGuard::settle`] reopens the breaker.
    pub fn guard_trial<'a>(&'a self, name: &'a str) -> TrialGuard<'a> {
        TrialGuard {
            registry: self,
            name,
            settled: false,
        }
    }

    fn abandon_trial(&self, name: &str) {
        let Some(mut breaker) = self.breakers.get_mut(name) else {
            return;
        };
        if breaker.state != CircuitState::HalfOpen || !breaker.trial_in_flight {
            return;
        }
        breaker.state = CircuitState::Open;
        breaker.trial_in_flight = false;
        breaker.next_retry = Some(Instant::now() + self.reset_timeout);
        breaker.next_retry_at = Some(
            Utc::now()
                + chrono::Duration::from_std(self.reset_timeout)
                    .unwrap_or_else(|_| chrono::Duration::zero()),
        );
        warn!(backend = name, "half-open trial abandoned, circuit reopened");
    }

    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers
            .get(name)
            .map(|b| b.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn consecutive_failures(&self, name: &str) -> u32 {
        self.breakers
            .get(name)
            .map(|b| b.consecutive_failures)
            .unwrap_or(0)
    }

    /// Snapshot of every breaker seen so far, sorted by backend name.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<BreakerSnapshot> = self
            .breakers
            .iter()
            .map(|entry| BreakerSnapshot {
                name: entry.key().clone(),
                state: entry.state,
                consecutive_failures: entry.consecutive_failures,
                last_failure: entry.last_failure,
                next_retry: entry.next_retry_at,
            })
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

/// Outstanding half-open trial; see [`CircuitBreakerRegistry::guard_trial`].
#[must_use = "dropping the guard abandons the trial"]
pub struct TrialGuard<'a> {
    registry: &'a CircuitBreakerRegistry,
    name: &'a str,
    settled: bool,
}

impl TrialGuard<'_> {
    /// Marks the trial as resolved by `record_success` or `record_failure`.
    pub fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.abandon_trial(self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn starts_closed() {
        let registry = CircuitBreakerRegistry::new(3, Duration::from_secs(60));
        assert_eq!(registry.state("primary"), CircuitState::Closed);
        assert_eq!(registry.try_acquire("primary"), Admission::Allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn opens_at_threshold() {
        let registry = CircuitBreakerRegistry::new(2, Duration::from_secs(60));
        registry.record_failure("primary");
        assert_eq!(registry.state("primary"), CircuitState::Closed);
        registry.record_failure("primary");
        assert_eq!(registry.state("primary"), CircuitState::Open);
        assert_eq!(registry.try_acquire("primary"), Admission::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_count() {
        let registry = CircuitBreakerRegistry::new(2, Duration::from_secs(60));
        registry.record_failure("primary");
        registry.record_success("primary");
        registry.record_failure("primary");
        assert_eq!(registry.state("primary"), CircuitState::Closed);
        assert_eq!(registry.consecutive_failures("primary"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_trial_after_timeout() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_secs(60));
        registry.record_failure("primary");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(registry.try_acquire("primary"), Admission::Rejected);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(registry.try_acquire("primary"), Admission::Trial);
        assert_eq!(registry.state("primary"), CircuitState::HalfOpen);
        // A second caller during the trial is turned away.
        assert_eq!(registry.try_acquire("primary"), Admission::Rejected);

        registry.record_success("primary");
        assert_eq!(registry.try_acquire("primary"), Admission::Allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens_for_full_timeout() {
        let registry = CircuitBreakerRegistry::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            registry.record_failure("primary");
        }
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(registry.try_acquire("primary"), Admission::Trial);

        registry.record_failure("primary");
        assert_eq!(registry.state("primary"), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(registry.try_acquire("primary"), Admission::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_guard_reopens_breaker() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_secs(60));
        registry.record_failure("primary");
        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(registry.try_acquire("primary"), Admission::Trial);
        drop(registry.guard_trial("primary"));
        assert_eq!(registry.state("primary"), CircuitState::Open);
        assert_eq!(registry.try_acquire("primary"), Admission::Rejected);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(registry.try_acquire("primary"), Admission::Trial);
        let guard = registry.guard_trial("primary");
        registry.record_success("primary");
        guard.settle();
        assert_eq!(registry.state("primary"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_lists_breakers_by_name() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_secs(60));
        registry.record_failure("secondary");
        registry.try_acquire("primary");

        let snap = registry.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "primary");
        assert_eq!(snap[1].state, CircuitState::Open);
        assert!(snap[1].next_retry.is_some());
    }
}
