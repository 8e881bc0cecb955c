// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory ticket store and static agent roster.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use handoff_config::AgentsConfig;
use handoff_core::{
    AgentDirectory, AgentId, ConversationId, HandoffError, Ticket, TicketId, TicketStatus,
    TicketStore, UserId,
};

/// Process-local [`TicketStore`]. Tickets are never deleted.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: DashMap<TicketId, Ticket>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn insert(&self, ticket: &Ticket) -> Result<(), HandoffError> {
        match self.tickets.entry(ticket.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(HandoffError::Internal(format!(
                "ticket {} already exists",
                ticket.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ticket.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, ticket: &Ticket) -> Result<(), HandoffError> {
        match self.tickets.get_mut(&ticket.id) {
            Some(mut existing) => {
                *existing = ticket.clone();
                Ok(())
            }
            None => Err(HandoffError::ticket_not_found(ticket.id.as_str())),
        }
    }

    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, HandoffError> {
        Ok(self.tickets.get(id).map(|t| t.clone()))
    }

    async fn find_open(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<Option<Ticket>, HandoffError> {
        Ok(self
            .tickets
            .iter()
            .find(|t| {
                t.status.is_open() && t.user_id == *user_id && t.conversation_id == *conversation_id
            })
            .map(|t| t.clone()))
    }

    async fn find_open_for_user(&self, user_id: &UserId) -> Result<Option<Ticket>, HandoffError> {
        Ok(self
            .tickets
            .iter()
            .filter(|t| t.status.is_open() && t.user_id == *user_id)
            .max_by_key(|t| t.created_at)
            .map(|t| t.clone()))
    }

    async fn list_by_status(&self, statuses: &[TicketStatus]) -> Result<Vec<Ticket>, HandoffError> {
        Ok(self
            .tickets
            .iter()
            .filter(|t| statuses.contains(&t.status))
            .map(|t| t.clone())
            .collect())
    }
}

/// Agent roster fixed at construction.
///
/// Unknown agents are unauthorized. Supervisors are implicitly authorized.
#[derive(Debug, Clone, Default)]
pub struct StaticAgentDirectory {
    authorized: HashSet<AgentId>,
    supervisors: Vec<AgentId>,
}

impl StaticAgentDirectory {
    pub fn new<A, S>(authorized: A, supervisors: S) -> Self
    where
        A: IntoIterator<Item = AgentId>,
        S: IntoIterator<Item = AgentId>,
    {
        let supervisors: Vec<AgentId> = supervisors.into_iter().collect();
        let mut authorized: HashSet<AgentId> = authorized.into_iter().collect();
        authorized.extend(supervisors.iter().cloned());
        Self {
            authorized,
            supervisors,
        }
    }

    pub fn from_config(config: &AgentsConfig) -> Self {
        Self::new(
            config.authorized.iter().map(|a| AgentId::from(a.as_str())),
            config.supervisors.iter().map(|a| AgentId::from(a.as_str())),
        )
    }
}

#[async_trait]
impl AgentDirectory for StaticAgentDirectory {
    async fn is_authorized(&self, agent_id: &AgentId) -> Result<bool, HandoffError> {
        Ok(self.authorized.contains(agent_id))
    }

    async fn supervisors(&self) -> Result<Vec<AgentId>, HandoffError> {
        Ok(self.supervisors.clone())
    }
}
