// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket persistence trait.

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::ticket::{Ticket, TicketStatus};
use crate::types::{ConversationId, TicketId, UserId};

/// Durable storage for tickets.
///
/// Implementations only persist; invariants (one open ticket per user and
/// conversation, legal transitions) are enforced by the ticket lifecycle,
/// which serializes writers per key before calling in here.
#[async_trait]
pub trait TicketStore: Send + Sync + 'static {
    /// Inserts a new ticket. Fails if the id already exists.
    async fn insert(&self, ticket: &Ticket) -> Result<(), HandoffError>;

    /// Replaces an existing ticket. Fails with `NotFound` if the id is unknown.
    async fn update(&self, ticket: &Ticket) -> Result<(), HandoffError>;

    /// Fetches a ticket by id.
    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, HandoffError>;

    /// Returns the open (`waiting` or `assigned`) ticket for a user and conversation.
    async fn find_open(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<Option<Ticket>, HandoffError>;

    /// Returns the most recent open ticket for a user in any conversation.
    async fn find_open_for_user(&self, user_id: &UserId) -> Result<Option<Ticket>, HandoffError>;

    /// Lists tickets whose status is one of `statuses`.
    async fn list_by_status(&self, statuses: &[TicketStatus]) -> Result<Vec<Ticket>, HandoffError>;
}
