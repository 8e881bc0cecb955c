// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier that records every event for later assertions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use handoff_core::{HandoffError, HandoffEvent, Notifier};

/// Captures delivered events in order.
///
/// In failing mode every delivery is rejected with an error and nothing is
/// recorded, which lets tests check that notification failures never roll
/// back the operation that produced them.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<HandoffEvent>>,
    arrived: Notify,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<HandoffEvent> {
        self.events.lock().await.clone()
    }

    /// Recorded events whose `event_type()` is `event_type`.
    pub async fn of_type(&self, event_type: &str) -> Vec<HandoffEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub async fn count(&self, event_type: &str) -> usize {
        self.of_type(event_type).await.len()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }

    /// Waits until an event of `event_type` has been recorded, up to `timeout`.
    pub async fn wait_for(&self, event_type: &str, timeout: Duration) -> Option<HandoffEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.arrived.notified();
            if let Some(event) = self.of_type(event_type).await.into_iter().next() {
                return Some(event);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: HandoffEvent) -> Result<(), HandoffError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HandoffError::Internal("notifier unavailable".to_string()));
        }
        self.events.lock().await.push(event);
        self.arrived.notify_waiters();
        Ok(())
    }
}
