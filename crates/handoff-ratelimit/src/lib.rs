// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user sliding-window rate limiting.
//!
//! A [`RateLimiter`] checks two windows per user (short, then long) against a
//! pluggable [`RateLimitStore`](handoff_core::RateLimitStore). When the store
//! is unreachable the limiter admits the request and logs a warning: rate
//! limiting is advisory, never a hard dependency.

pub mod limiter;
pub mod store;

pub use limiter::{RateDecision, RateLimiter, RateWindow, Violation, WindowKind};
pub use store::InMemoryRateLimitStore;
