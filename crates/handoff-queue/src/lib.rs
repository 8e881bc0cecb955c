// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded FIFO buffer of inbound chat messages.
//!
//! [`InboundQueue::enqueue`] is the engine's single backpressure point: a
//! full queue rejects immediately with
//! [`CapacityKind::QueueFull`](handoff_core::CapacityKind::QueueFull) instead
//! of blocking or growing.

use std::collections::VecDeque;
use std::future::Future;

use handoff_config::QueueConfig;
use handoff_core::{CapacityKind, HandoffError, QueuedMessage};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default maximum number of pending messages.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded in-memory FIFO of [`QueuedMessage`]s.
#[derive(Debug)]
pub struct InboundQueue {
    items: Mutex<VecDeque<QueuedMessage>>,
    capacity: usize,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Appends a message to the tail.
    ///
    /// Returns the 1-based position of the message in the queue.
    pub async fn enqueue(&self, message: QueuedMessage) -> Result<usize, HandoffError> {
        let mut items = self.items.lock().await;
        if items.len() >= self.capacity {
            warn!(
                message_id = %message.id,
                user_id = %message.user_id,
                capacity = self.capacity,
                "inbound queue full, rejecting message"
            );
            return Err(HandoffError::Capacity(CapacityKind::QueueFull {
                capacity: self.capacity,
            }));
        }
        items.push_back(message);
        Ok(items.len())
    }

    /// Removes and returns the head of the queue.
    pub async fn dequeue(&self) -> Option<QueuedMessage> {
        self.items.lock().await.pop_front()
    }

    /// Returns a copy of the head without removing it.
    pub async fn peek(&self) -> Option<QueuedMessage> {
        self.items.lock().await.front().cloned()
    }

    pub async fn size(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every pending message, returning how many were removed.
    pub async fn clear(&self) -> usize {
        let mut items = self.items.lock().await;
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Drains up to `batch_size` messages through `handler`, one at a time.
    ///
    /// A message whose handler fails goes back to the tail with its
    /// `attempts` counter incremented, and the handler's error is returned
    /// without processing the rest of the batch. On success returns the
    /// number of messages handled.
    pub async fn process_queue<F, Fut>(
        &self,
        mut handler: F,
        batch_size: usize,
    ) -> Result<usize, HandoffError>
    where
        F: FnMut(QueuedMessage) -> Fut,
        Fut: Future<Output = Result<(), HandoffError>>,
    {
        let mut processed = 0;
        while processed < batch_size {
            let Some(message) = self.dequeue().await else {
                break;
            };

            if let Err(e) = handler(message.clone()).await {
                warn!(
                    message_id = %message.id,
                    attempts = message.attempts + 1,
                    error = %e,
                    "message handler failed, re-enqueueing"
                );
                self.requeue(message).await;
                return Err(e);
            }
            processed += 1;
        }

        if processed > 0 {
            debug!(processed, "queue batch drained");
        }
        Ok(processed)
    }

    /// Puts a message back at the tail after a failure.
    ///
    /// The slot was freed by the dequeue that took the message out, so this
    /// skips the capacity check; a burst of concurrent enqueues can push the
    /// queue past capacity by at most the number of in-flight drains.
    async fn requeue(&self, mut message: QueuedMessage) {
        message.attempts += 1;
        let mut items = self.items.lock().await;
        items.push_back(message);
        if items.len() > self.capacity {
            warn!(
                size = items.len(),
                capacity = self.capacity,
                "queue over capacity after requeue"
            );
        }
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
