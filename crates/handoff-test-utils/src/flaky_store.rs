// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket store that fails on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use handoff_core::{
    ConversationId, HandoffError, Ticket, TicketId, TicketStatus, TicketStore, UserId,
};
use handoff_ticket::InMemoryTicketStore;

/// Wraps an [`InMemoryTicketStore`] and fails the next N `find_open` calls
/// with a storage error.
pub struct FlakyTicketStore {
    inner: Arc<InMemoryTicketStore>,
    find_open_failures: AtomicUsize,
}

impl FlakyTicketStore {
    pub fn new(inner: Arc<InMemoryTicketStore>) -> Self {
        Self {
            inner,
            find_open_failures: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` calls to `find_open` fail.
    pub fn fail_find_open(&self, count: usize) {
        self.find_open_failures.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TicketStore for FlakyTicketStore {
    async fn insert(&self, ticket: &Ticket) -> Result<(), HandoffError> {
        self.inner.insert(ticket).await
    }

    async fn update(&self, ticket: &Ticket) -> Result<(), HandoffError> {
        self.inner.update(ticket).await
    }

    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, HandoffError> {
        self.inner.get(id).await
    }

    async fn find_open(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<Option<Ticket>, HandoffError> {
        if Self::take_failure(&self.find_open_failures) {
            return Err(HandoffError::Storage {
                source: "ticket store unavailable".into(),
            });
        }
        self.inner.find_open(user_id, conversation_id).await
    }

    async fn find_open_for_user(&self, user_id: &UserId) -> Result<Option<Ticket>, HandoffError> {
        self.inner.find_open_for_user(user_id).await
    }

    async fn list_by_status(&self, statuses: &[TicketStatus]) -> Result<Vec<Ticket>, HandoffError> {
        self.inner.list_by_status(statuses).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fails_only_the_requested_number_of_times() {
        let store = FlakyTicketStore::new(Arc::new(InMemoryTicketStore::new()));
        let user = UserId::from("citizen-1");
        let conversation = ConversationId::from("s-1");
        store.fail_find_open(1);

        assert!(matches!(
            store.find_open(&user, &conversation).await,
            Err(HandoffError::Storage { .. })
        ));
        assert!(store.find_open(&user, &conversation).await.unwrap().is_none());
    }
}
