// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent roster trait.

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::types::AgentId;

/// Answers who may work tickets and who supervises them.
#[async_trait]
pub trait AgentDirectory: Send + Sync + 'static {
    /// Whether `agent_id` may be assigned tickets.
    async fn is_authorized(&self, agent_id: &AgentId) -> Result<bool, HandoffError>;

    /// Agents that receive SLA warnings and breaches for every ticket.
    async fn supervisors(&self) -> Result<Vec<AgentId>, HandoffError>;
}
