// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Handoff integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without external services.
//!
//! # Components
//!
//! - [`MockBackend`] - Scripted text-generation backend
//! - [`RecordingNotifier`] - Notifier that captures every event
//! - [`FlakyTicketStore`] - Ticket store with injectable failures
//! - [`TestHarness`] - A fully wired engine over the mocks

pub mod flaky_store;
pub mod harness;
pub mod mock_backend;
pub mod recording_notifier;

pub use flaky_store::FlakyTicketStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_backend::{MockBackend, MockReply};
pub use recording_notifier::RecordingNotifier;
