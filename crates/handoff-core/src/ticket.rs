// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket records for human handoff.
//!
//! A [`Ticket`] is the unit of human-handoff work. Its status only moves
//! forward (`waiting -> assigned -> resolved`, `waiting -> cancelled`) with a
//! single exception: an assigned ticket may return to `waiting` when the
//! agent releases it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{AgentId, ConversationId, TicketId, Turn, UserId};

/// Default numeric priority when the caller does not supply one.
pub const DEFAULT_PRIORITY: u8 = 3;

/// Lifecycle status of a ticket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Waiting,
    Assigned,
    Resolved,
    Cancelled,
}

impl TicketStatus {
    /// Whether the ticket still counts against the one-open-ticket invariant.
    pub fn is_open(self) -> bool {
        matches!(self, TicketStatus::Waiting | TicketStatus::Assigned)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Cancelled)
    }
}

/// Priority tier derived from the numeric priority.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Emergency,
}

impl PriorityLevel {
    /// Maps a numeric priority (1-5) to its tier.
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            p if p >= 5 => PriorityLevel::Emergency,
            4 => PriorityLevel::High,
            3 => PriorityLevel::Medium,
            _ => PriorityLevel::Low,
        }
    }

    /// All tiers, lowest first.
    pub fn all() -> [PriorityLevel; 4] {
        [
            PriorityLevel::Low,
            PriorityLevel::Medium,
            PriorityLevel::High,
            PriorityLevel::Emergency,
        ]
    }
}

/// Who performed an action on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// The engine itself (SLA breach, automatic routing).
    System,
    Agent(AgentId),
    User(UserId),
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Agent(id) => write!(f, "agent:{id}"),
            Actor::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// How a ticket came to be assigned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    /// A supervisor picked the agent.
    Manual,
    /// The agent claimed the ticket from the queue.
    SelfAssign,
    /// Automatic routing.
    Auto,
    /// The ticket arrived through a transfer from another agent.
    Transfer,
}

/// SLA bookkeeping for a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaRecord {
    pub response_deadline: DateTime<Utc>,
    pub resolution_deadline: DateTime<Utc>,
    /// Number of escalations so far. Never decreases.
    pub escalation_level: u32,
    pub is_overdue: bool,
}

/// One stint of an agent holding a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub agent_id: AgentId,
    pub method: AssignmentMethod,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
    /// Why the stint ended (transfer reason, release reason).
    pub reason: Option<String>,
}

/// One escalation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub level: u32,
    pub reason: String,
    pub escalated_by: Actor,
    pub escalated_at: DateTime<Utc>,
}

/// Caller feedback collected after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Rating from 1 to 5.
    pub rating: u8,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// The record tracking a single human-handoff request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub status: TicketStatus,
    /// Numeric priority, 1 (lowest) to 5 (emergency).
    pub priority: u8,
    pub priority_level: PriorityLevel,
    pub reason: String,
    /// Snapshot of recent turns captured at creation.
    pub context: Vec<Turn>,
    pub sla: SlaRecord,
    pub assignment_history: Vec<AssignmentRecord>,
    /// Set iff `status == Assigned`.
    pub assigned_agent: Option<AgentId>,
    pub escalation_history: Vec<EscalationRecord>,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Milliseconds between the last assignment and resolution.
    pub resolution_time_ms: Option<i64>,
    pub feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// The assignment history entry that is still open, if any.
    pub fn current_assignment(&self) -> Option<&AssignmentRecord> {
        self.assignment_history
            .iter()
            .rev()
            .find(|a| a.unassigned_at.is_none())
    }

    /// Closes the open assignment history entry with the given reason.
    pub fn close_current_assignment(&mut self, at: DateTime<Utc>, reason: Option<String>) {
        if let Some(entry) = self
            .assignment_history
            .iter_mut()
            .rev()
            .find(|a| a.unassigned_at.is_none())
        {
            entry.unassigned_at = Some(at);
            entry.reason = reason;
        }
    }

    /// Whether `agent_id` currently holds this ticket.
    pub fn is_held_by(&self, agent_id: &AgentId) -> bool {
        self.status == TicketStatus::Assigned && self.assigned_agent.as_ref() == Some(agent_id)
    }

    /// Ordering key for the waiting queue: higher priority first, then oldest first.
    ///
    /// Returns `true` if `self` is served before `other`.
    pub fn is_ahead_of(&self, other: &Ticket) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority && self.created_at < other.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_levels_from_numbers() {
        assert_eq!(PriorityLevel::from_priority(1), PriorityLevel::Low);
        assert_eq!(PriorityLevel::from_priority(2), PriorityLevel::Low);
        assert_eq!(PriorityLevel::from_priority(3), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_priority(4), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_priority(5), PriorityLevel::Emergency);
    }

    #[test]
    fn priority_levels_are_ordered() {
        assert!(PriorityLevel::Emergency > PriorityLevel::High);
        assert!(PriorityLevel::High > PriorityLevel::Medium);
        assert!(PriorityLevel::Medium > PriorityLevel::Low);
    }

    #[test]
    fn open_and_terminal_statuses() {
        assert!(TicketStatus::Waiting.is_open());
        assert!(TicketStatus::Assigned.is_open());
        assert!(TicketStatus::Resolved.is_terminal());
        assert!(TicketStatus::Cancelled.is_terminal());
        assert!(!TicketStatus::Waiting.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&TicketStatus::Assigned).unwrap();
        assert_eq!(json, "\"assigned\"");
        assert_eq!(TicketStatus::Waiting.to_string(), "waiting");
    }

    #[test]
    fn actor_display() {
        assert_eq!(Actor::System.to_string(), "system");
        assert_eq!(Actor::Agent(AgentId::from("a1")).to_string(), "agent:a1");
    }
}
