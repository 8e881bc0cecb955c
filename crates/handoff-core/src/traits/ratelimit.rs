// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backing store for sliding-window rate limiting.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::types::UserId;

/// Outcome of checking one window for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCheck {
    /// Whether the request fit in the window (and was recorded).
    pub allowed: bool,
    /// Requests in the window after pruning, including this one if recorded.
    pub count: u32,
    /// Oldest surviving timestamp in the window.
    pub oldest: Option<Instant>,
}

/// Per-(user, window) timestamp sets.
///
/// `check_and_record` must be atomic per key: prune timestamps older than
/// `now - window`, then either reject (count >= limit) or record `now`.
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    async fn check_and_record(
        &self,
        user_id: &UserId,
        window: Duration,
        limit: u32,
        now: Instant,
    ) -> Result<WindowCheck, HandoffError>;

    /// Removes a timestamp recorded by `check_and_record` at `recorded_at`,
    /// returning its slot. Unknown timestamps are ignored.
    async fn release(
        &self,
        user_id: &UserId,
        window: Duration,
        recorded_at: Instant,
    ) -> Result<(), HandoffError>;

    /// Drops every window recorded for `user_id`.
    async fn clear(&self, user_id: &UserId) -> Result<(), HandoffError>;
}
