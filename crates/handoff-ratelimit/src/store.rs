// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory rate-limit store.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use handoff_core::{HandoffError, RateLimitStore, UserId, WindowCheck};

/// Timestamp sets keyed by (user, window length).
///
/// Each check holds the shard lock for its key while pruning and recording,
/// so concurrent requests from one user cannot both take the last slot.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<(UserId, Duration), VecDeque<Instant>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (user, window) entries currently tracked.
    pub fn tracked_windows(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn check_and_record(
        &self,
        user_id: &UserId,
        window: Duration,
        limit: u32,
        now: Instant,
    ) -> Result<WindowCheck, HandoffError> {
        let mut entry = self.windows.entry((user_id.clone(), window)).or_default();
        let timestamps = entry.value_mut();

        // Timestamps are appended in order, so expired ones sit at the front.
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        let count = u32::try_from(timestamps.len()).unwrap_or(u32::MAX);
        if count >= limit {
            return Ok(WindowCheck {
                allowed: false,
                count,
                oldest: timestamps.front().copied(),
            });
        }

        timestamps.push_back(now);
        Ok(WindowCheck {
            allowed: true,
            count: count + 1,
            oldest: timestamps.front().copied(),
        })
    }

    async fn release(
        &self,
        user_id: &UserId,
        window: Duration,
        recorded_at: Instant,
    ) -> Result<(), HandoffError> {
        if let Some(mut entry) = self.windows.get_mut(&(user_id.clone(), window)) {
            let timestamps = entry.value_mut();
            if let Some(pos) = timestamps.iter().rposition(|&t| t == recorded_at) {
                timestamps.remove(pos);
            }
        }
        Ok(())
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), HandoffError> {
        self.windows.retain(|(user, _), _| user != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_at_limit_and_prunes_expired() {
        let store = InMemoryRateLimitStore::new();
        let user = UserId::from("u1");
        let window = Duration::from_secs(10);
        let start = Instant::now();

        for i in 0..3 {
            let check = store
                .check_and_record(&user, window, 3, start + Duration::from_secs(i))
                .await
                .unwrap();
            assert!(check.allowed);
            assert_eq!(check.count, i as u32 + 1);
        }

        let rejected = store
            .check_and_record(&user, window, 3, start + Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.oldest, Some(start));

        // The first timestamp has aged out.
        let later = store
            .check_and_record(&user, window, 3, start + Duration::from_secs(10))
            .await
            .unwrap();
        assert!(later.allowed);
        assert_eq!(later.count, 3);
    }

    #[tokio::test]
    async fn release_returns_the_slot() {
        let store = InMemoryRateLimitStore::new();
        let user = UserId::from("u1");
        let window = Duration::from_secs(10);
        let now = Instant::now();

        assert!(store.check_and_record(&user, window, 1, now).await.unwrap().allowed);
        store.release(&user, window, now).await.unwrap();
        let again = store.check_and_record(&user, window, 1, now).await.unwrap();
        assert!(again.allowed);
        assert_eq!(again.count, 1);
    }

    #[tokio::test]
    async fn windows_are_independent_per_user_and_length() {
        let store = InMemoryRateLimitStore::new();
        let now = Instant::now();
        let short = Duration::from_secs(60);
        let long = Duration::from_secs(3600);

        store.check_and_record(&"a".into(), short, 1, now).await.unwrap();
        store.check_and_record(&"a".into(), long, 1, now).await.unwrap();
        store.check_and_record(&"b".into(), short, 1, now).await.unwrap();
        assert_eq!(store.tracked_windows(), 3);

        store.clear(&"a".into()).await.unwrap();
        assert_eq!(store.tracked_windows(), 1);
    }
}
