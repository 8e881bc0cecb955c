// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-window admission control.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use handoff_config::RateLimitConfig;
use handoff_core::{HandoffError, RateLimitStore, UserId, WindowCheck};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One sliding window: at most `limit` requests per `length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub limit: u32,
    pub length: Duration,
}

/// Which window rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Short,
    Long,
}

/// Result of [`RateLimiter::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left before the tighter of the two windows rejects.
    pub remaining: u32,
    /// When the window that governs `remaining` next frees a slot.
    pub reset_at: DateTime<Utc>,
    /// Set on rejection; always positive.
    pub retry_after: Option<Duration>,
}

/// An audit entry for a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub user_id: UserId,
    pub window: WindowKind,
    pub limit: u32,
    pub retry_after_secs: u64,
    pub at: DateTime<Utc>,
}

/// Per-user sliding-window rate limiter with a short and a long window.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    short: RateWindow,
    long: RateWindow,
    bypass: DashSet<UserId>,
    violations: Mutex<VecDeque<Violation>>,
    violation_log_size: usize,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, short: RateWindow, long: RateWindow) -> Self {
        Self {
            store,
            short,
            long,
            bypass: DashSet::new(),
            violations: Mutex::new(VecDeque::new()),
            violation_log_size: 1000,
        }
    }

    /// Builds a limiter from the `[rate_limit]` config section.
    pub fn from_config(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        let mut limiter = Self::new(
            store,
            RateWindow {
                limit: config.short_window_requests,
                length: Duration::from_secs(config.short_window_secs),
            },
            RateWindow {
                limit: config.long_window_requests,
                length: Duration::from_secs(config.long_window_secs),
            },
        );
        limiter.violation_log_size = config.violation_log_size;
        for user in &config.bypass_users {
            limiter.bypass.insert(UserId::from(user.as_str()));
        }
        limiter
    }

    /// Decides whether `user_id` may submit another message now.
    ///
    /// The short window is checked first and a rejection there skips the
    /// long window. A long-window rejection gives back the short-window slot
    /// just taken. A store failure admits the request.
    pub async fn admit(&self, user_id: &UserId) -> RateDecision {
        if self.bypass.contains(user_id) {
            return self.unlimited();
        }

        let now = Instant::now().into_std();

        let short = match self.check(user_id, self.short, now).await {
            Some(check) => check,
            None => return self.unlimited(),
        };
        if !short.allowed {
            return self
                .reject(user_id, WindowKind::Short, self.short, short, now)
                .await;
        }

        let long = match self.check(user_id, self.long, now).await {
            Some(check) => check,
            None => return self.unlimited(),
        };
        if !long.allowed {
            if let Err(e) = self.store.release(user_id, self.short.length, now).await {
                warn!(user_id = %user_id, error = %e, "failed to release short-window slot");
            }
            return self
                .reject(user_id, WindowKind::Long, self.long, long, now)
                .await;
        }

        let short_left = self.short.limit.saturating_sub(short.count);
        let long_left = self.long.limit.saturating_sub(long.count);
        let (remaining, governing, check) = if short_left <= long_left {
            (short_left, self.short, short)
        } else {
            (long_left, self.long, long)
        };

        RateDecision {
            allowed: true,
            remaining,
            reset_at: Utc::now() + to_chrono(until_slot_frees(governing, check, now)),
            retry_after: None,
        }
    }

    /// Clears all recorded windows for a user (admin action).
    pub async fn reset(&self, user_id: &UserId) -> Result<(), HandoffError> {
        self.store.clear(user_id).await?;
        info!(user_id = %user_id, "rate limit windows reset");
        Ok(())
    }

    /// Snapshot of the violation log, oldest first.
    pub async fn violations(&self) -> Vec<Violation> {
        self.violations.lock().await.iter().cloned().collect()
    }

    pub fn add_bypass(&self, user_id: UserId) {
        self.bypass.insert(user_id);
    }

    pub fn remove_bypass(&self, user_id: &UserId) -> bool {
        self.bypass.remove(user_id).is_some()
    }

    pub fn is_bypassed(&self, user_id: &UserId) -> bool {
        self.bypass.contains(user_id)
    }

    async fn check(
        &self,
        user_id: &UserId,
        window: RateWindow,
        now: std::time::Instant,
    ) -> Option<WindowCheck> {
        match self
            .store
            .check_and_record(user_id, window.length, window.limit, now)
            .await
        {
            Ok(check) => Some(check),
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "rate limit store unavailable, admitting request"
                );
                None
            }
        }
    }

    async fn reject(
        &self,
        user_id: &UserId,
        kind: WindowKind,
        window: RateWindow,
        check: WindowCheck,
        now: std::time::Instant,
    ) -> RateDecision {
        // Never advertise a zero wait: the slot is still taken at this instant.
        let retry_after = until_slot_frees(window, check, now).max(Duration::from_secs(1));
        debug!(
            user_id = %user_id,
            window = ?kind,
            limit = window.limit,
            retry_after_secs = retry_after.as_secs(),
            "rate limit exceeded"
        );

        let at = Utc::now();
        let mut log = self.violations.lock().await;
        log.push_back(Violation {
            user_id: user_id.clone(),
            window: kind,
            limit: window.limit,
            retry_after_secs: retry_after.as_secs(),
            at,
        });
        while log.len() > self.violation_log_size {
            log.pop_front();
        }

        RateDecision {
            allowed: false,
            remaining: 0,
            reset_at: at + to_chrono(retry_after),
            retry_after: Some(retry_after),
        }
    }

    fn unlimited(&self) -> RateDecision {
        RateDecision {
            allowed: true,
            remaining: self.short.limit,
            reset_at: Utc::now(),
            retry_after: None,
        }
    }
}

/// Time until the oldest surviving timestamp leaves the window.
fn until_slot_frees(window: RateWindow, check: WindowCheck, now: std::time::Instant) -> Duration {
    check
        .oldest
        .map(|oldest| (oldest + window.length).saturating_duration_since(now))
        .unwrap_or(window.length)
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRateLimitStore;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct UnreachableStore;

    #[async_trait]
    impl RateLimitStore for UnreachableStore {
        async fn check_and_record(
            &self,
            _user_id: &UserId,
            _window: Duration,
            _limit: u32,
            _now: std::time::Instant,
        ) -> Result<WindowCheck, HandoffError> {
            Err(HandoffError::Storage {
                source: "connection refused".into(),
            })
        }

        async fn release(
            &self,
            _user_id: &UserId,
            _window: Duration,
            _recorded_at: std::time::Instant,
        ) -> Result<(), HandoffError> {
            Ok(())
        }

        async fn clear(&self, _user_id: &UserId) -> Result<(), HandoffError> {
            Ok(())
        }
    }

    fn limiter(short: u32, long: u32) -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            RateWindow {
                limit: short,
                length: Duration::from_secs(60),
            },
            RateWindow {
                limit: long,
                length: Duration::from_secs(3600),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn store_failure_fails_open() {
        let limiter = RateLimiter::new(
            Arc::new(UnreachableStore),
            RateWindow {
                limit: 1,
                length: Duration::from_secs(60),
            },
            RateWindow {
                limit: 1,
                length: Duration::from_secs(3600),
            },
        );
        for _ in 0..5 {
            assert!(limiter.admit(&"u1".into()).await.allowed);
        }
        assert!(logs_contain("rate limit store unavailable"));
        assert!(limiter.violations().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_tracks_tighter_window() {
        let limiter = limiter(3, 100);
        let user = UserId::from("u1");
        assert_eq!(limiter.admit(&user).await.remaining, 2);
        assert_eq!(limiter.admit(&user).await.remaining, 1);
        assert_eq!(limiter.admit(&user).await.remaining, 0);
        assert!(!limiter.admit(&user).await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn long_window_rejects_after_short_windows_roll() {
        let limiter = limiter(2, 3);
        let user = UserId::from("u1");

        assert!(limiter.admit(&user).await.allowed);
        assert!(limiter.admit(&user).await.allowed);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.admit(&user).await.allowed);

        let decision = limiter.admit(&user).await;
        assert!(!decision.allowed);
        let retry = decision.retry_after.unwrap();
        assert!(retry > Duration::from_secs(60), "long window governs: {retry:?}");

        let log = limiter.violations().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].window, WindowKind::Long);
    }

    #[tokio::test(start_paused = true)]
    async fn long_window_rejection_keeps_short_slot_free() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = RateLimiter::new(
            store.clone(),
            RateWindow {
                limit: 2,
                length: Duration::from_secs(60),
            },
            RateWindow {
                limit: 2,
                length: Duration::from_secs(3600),
            },
        );
        let user = UserId::from("u1");

        assert!(limiter.admit(&user).await.allowed);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.admit(&user).await.allowed);
        assert!(!limiter.admit(&user).await.allowed);

        // Only the admitted request occupies the short window.
        let now = Instant::now().into_std();
        let check = store
            .check_and_record(&user, Duration::from_secs(60), 2, now)
            .await
            .unwrap();
        assert!(check.allowed);
        assert_eq!(check.count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bypass_and_reset() {
        let limiter = limiter(1, 100);
        let user = UserId::from("ops");

        assert!(limiter.admit(&user).await.allowed);
        assert!(!limiter.admit(&user).await.allowed);

        limiter.add_bypass(user.clone());
        assert!(limiter.admit(&user).await.allowed);
        assert!(limiter.remove_bypass(&user));
        assert!(!limiter.admit(&user).await.allowed);

        limiter.reset(&user).await.unwrap();
        assert!(limiter.admit(&user).await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn violation_log_is_bounded() {
        let mut limiter = limiter(1, 100);
        limiter.violation_log_size = 3;
        let user = UserId::from("u1");
        limiter.admit(&user).await;
        for _ in 0..10 {
            limiter.admit(&user).await;
        }
        assert_eq!(limiter.violations().await.len(), 3);
    }
}
