// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for text generation.
//!
//! [`CircuitBreakerRegistry`] keeps one breaker per backend for the life of
//! the process. [`ResponseProvider`] walks the configured backends in
//! priority order behind those breakers and never fails: when every backend
//! is exhausted it returns a fixed apology flagged for human handoff.

pub mod circuit_breaker;
pub mod provider;

pub use circuit_breaker::{Admission, BreakerSnapshot, CircuitBreakerRegistry, CircuitState, TrialGuard};
pub use provider::{BackendPolicy, GeneratedResponse, ResponseProvider};
