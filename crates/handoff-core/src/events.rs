// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound lifecycle events delivered through a [`Notifier`](crate::traits::Notifier).

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::ticket::{Actor, AssignmentMethod, PriorityLevel, Ticket, TicketStatus};
use crate::types::{AgentId, ConversationId, SessionId, TicketId, UserId};

/// The ticket fields carried by every ticket event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: TicketId,
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub status: TicketStatus,
    pub priority: u8,
    pub priority_level: PriorityLevel,
    pub reason: String,
    pub assigned_agent: Option<AgentId>,
    pub escalation_level: u32,
    pub response_deadline: DateTime<Utc>,
    pub resolution_deadline: DateTime<Utc>,
    pub is_overdue: bool,
}

impl From<&Ticket> for TicketSummary {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id.clone(),
            user_id: t.user_id.clone(),
            conversation_id: t.conversation_id.clone(),
            status: t.status,
            priority: t.priority,
            priority_level: t.priority_level,
            reason: t.reason.clone(),
            assigned_agent: t.assigned_agent.clone(),
            escalation_level: t.sla.escalation_level,
            response_deadline: t.sla.response_deadline,
            resolution_deadline: t.sla.resolution_deadline,
            is_overdue: t.sla.is_overdue,
        }
    }
}

/// Urgency of an SLA warning, from the time left before the response deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SlaSeverity {
    Yellow,
    Orange,
    Red,
}

impl SlaSeverity {
    /// `red` under 5 minutes, `orange` under 10 minutes, `yellow` otherwise.
    pub fn from_remaining(remaining: Duration) -> Self {
        match remaining.as_secs() {
            s if s < 5 * 60 => SlaSeverity::Red,
            s if s < 10 * 60 => SlaSeverity::Orange,
            _ => SlaSeverity::Yellow,
        }
    }
}

/// Snapshot of the waiting/assigned ticket population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Open tickets (`waiting + assigned`).
    pub total: usize,
    pub waiting: usize,
    pub assigned: usize,
    /// Waiting tickets per priority tier. Every tier is present.
    pub waiting_by_priority: BTreeMap<PriorityLevel, usize>,
    /// Mean time waiting tickets have spent in the queue, in seconds.
    pub average_wait_secs: f64,
    /// Longest time any waiting ticket has spent in the queue, in seconds.
    pub longest_wait_secs: i64,
}

/// Events emitted by the engine. Every variant carries its own timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HandoffEvent {
    TicketCreated {
        ticket: TicketSummary,
        /// Waiting tickets served before this one (0 = next in line).
        queue_position: usize,
        timestamp: DateTime<Utc>,
    },
    TicketAssigned {
        ticket: TicketSummary,
        agent_id: AgentId,
        method: AssignmentMethod,
        timestamp: DateTime<Utc>,
    },
    TicketResolved {
        ticket: TicketSummary,
        agent_id: AgentId,
        resolution_time_ms: Option<i64>,
        timestamp: DateTime<Utc>,
    },
    TicketTransferred {
        ticket: TicketSummary,
        from_agent: AgentId,
        to_agent: AgentId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    TicketEscalated {
        ticket: TicketSummary,
        level: u32,
        reason: String,
        escalated_by: Actor,
        timestamp: DateTime<Utc>,
    },
    TicketUnassigned {
        ticket: TicketSummary,
        agent_id: AgentId,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    TicketCancelled {
        ticket: TicketSummary,
        cancelled_by: Actor,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    SlaWarning {
        ticket: TicketSummary,
        remaining_secs: i64,
        severity: SlaSeverity,
        /// Assignee (if any) followed by the supervisors.
        recipients: Vec<AgentId>,
        timestamp: DateTime<Utc>,
    },
    SlaBreach {
        ticket: TicketSummary,
        recipients: Vec<AgentId>,
        timestamp: DateTime<Utc>,
    },
    QueueStatsUpdated {
        stats: QueueStats,
        timestamp: DateTime<Utc>,
    },
    FeedbackRequested {
        ticket_id: TicketId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    AssistantReply {
        user_id: UserId,
        session_id: SessionId,
        text: String,
        confidence: f32,
        provider: Option<String>,
        timestamp: DateTime<Utc>,
    },
    AgentMessage {
        ticket_id: TicketId,
        agent_id: AgentId,
        user_id: UserId,
        text: String,
        timestamp: DateTime<Utc>,
    },
    QueuedAcknowledgement {
        ticket_id: TicketId,
        user_id: UserId,
        session_id: SessionId,
        queue_position: usize,
        timestamp: DateTime<Utc>,
    },
    ContextReset {
        user_id: UserId,
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
}

impl HandoffEvent {
    /// Wire name of the event (`ticket_created`, `sla_breach`, ...).
    pub fn event_type(&self) -> &'static str {
        self.into()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HandoffEvent::TicketCreated { timestamp, .. }
            | HandoffEvent::TicketAssigned { timestamp, .. }
            | HandoffEvent::TicketResolved { timestamp, .. }
            | HandoffEvent::TicketTransferred { timestamp, .. }
            | HandoffEvent::TicketEscalated { timestamp, .. }
            | HandoffEvent::TicketUnassigned { timestamp, .. }
            | HandoffEvent::TicketCancelled { timestamp, .. }
            | HandoffEvent::SlaWarning { timestamp, .. }
            | HandoffEvent::SlaBreach { timestamp, .. }
            | HandoffEvent::QueueStatsUpdated { timestamp, .. }
            | HandoffEvent::FeedbackRequested { timestamp, .. }
            | HandoffEvent::AssistantReply { timestamp, .. }
            | HandoffEvent::AgentMessage { timestamp, .. }
            | HandoffEvent::QueuedAcknowledgement { timestamp, .. }
            | HandoffEvent::ContextReset { timestamp, .. } => *timestamp,
        }
    }

    /// Ticket the event concerns, if it is a ticket event.
    pub fn ticket_id(&self) -> Option<&TicketId> {
        match self {
            HandoffEvent::TicketCreated { ticket, .. }
            | HandoffEvent::TicketAssigned { ticket, .. }
            | HandoffEvent::TicketResolved { ticket, .. }
            | HandoffEvent::TicketTransferred { ticket, .. }
            | HandoffEvent::TicketEscalated { ticket, .. }
            | HandoffEvent::TicketUnassigned { ticket, .. }
            | HandoffEvent::TicketCancelled { ticket, .. }
            | HandoffEvent::SlaWarning { ticket, .. }
            | HandoffEvent::SlaBreach { ticket, .. } => Some(&ticket.id),
            HandoffEvent::FeedbackRequested { ticket_id, .. }
            | HandoffEvent::AgentMessage { ticket_id, .. }
            | HandoffEvent::QueuedAcknowledgement { ticket_id, .. } => Some(ticket_id),
            HandoffEvent::QueueStatsUpdated { .. }
            | HandoffEvent::AssistantReply { .. }
            | HandoffEvent::ContextReset { .. } => None,
        }
    }
}
