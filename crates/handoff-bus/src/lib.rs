// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process event bus for lifecycle events.
//!
//! [`EventBus`] fans [`HandoffEvent`]s out to any number of subscribers over
//! a tokio broadcast channel. Publishing never blocks and never fails the
//! caller: with no subscribers the event is dropped, and slow subscribers
//! observe `RecvError::Lagged` instead of holding back the engine.

use std::sync::Arc;

use async_trait::async_trait;
use handoff_core::{HandoffError, HandoffEvent, Notifier, TicketId};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast buffer per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Shared reference to an [`EventBus`].
pub type SharedEventBus = Arc<EventBus>;

/// Broadcast fan-out of lifecycle events.
pub struct EventBus {
    sender: broadcast::Sender<HandoffEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: HandoffEvent) -> usize {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "event published");
                count
            }
            Err(_) => {
                debug!(event_type, "event published (no receivers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HandoffEvent> {
        self.sender.subscribe()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for EventBus {
    async fn notify(&self, event: HandoffEvent) -> Result<(), HandoffError> {
        self.publish(event);
        Ok(())
    }
}

/// Selects a subset of events, e.g. one agent dashboard following one ticket.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events concerning this ticket.
    pub ticket_id: Option<TicketId>,
    /// Only events whose [`HandoffEvent::event_type`] is listed.
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_ticket(mut self, ticket_id: TicketId) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `event` passes every configured criterion.
    pub fn matches(&self, event: &HandoffEvent) -> bool {
        if let Some(wanted) = &self.ticket_id {
            if event.ticket_id() != Some(wanted) {
                return false;
            }
        }
        if let Some(types) = &self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use handoff_core::UserId;

    fn feedback(ticket: &str) -> HandoffEvent {
        HandoffEvent::FeedbackRequested {
            ticket_id: TicketId::from(ticket),
            user_id: UserId::from("u1"),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(feedback("tkt-1")), 2);

        assert_eq!(rx1.recv().await.unwrap().event_type(), "feedback_requested");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "feedback_requested");
    }

    #[tokio::test]
    async fn notify_without_subscribers_succeeds() {
        let bus = EventBus::new();
        assert!(!bus.has_subscribers());
        bus.notify(feedback("tkt-1")).await.unwrap();
    }

    #[test]
    fn filter_by_ticket_and_type() {
        let filter = EventFilter::new()
            .for_ticket(TicketId::from("tkt-1"))
            .with_types(["feedback_requested"]);
        assert!(filter.matches(&feedback("tkt-1")));
        assert!(!filter.matches(&feedback("tkt-2")));

        let stats = HandoffEvent::QueueStatsUpdated {
            stats: Default::default(),
            timestamp: Utc::now(),
        };
        assert!(!filter.matches(&stats));
        assert!(EventFilter::new().matches(&stats));
    }
}
