// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Handoff orchestration engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Handoff workspace. Every external
//! collaborator (text-generation backends, ticket storage, the agent roster,
//! event delivery, the rate-limit store) is reached through a trait defined
//! here.

pub mod error;
pub mod events;
pub mod ticket;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{CapacityKind, ErrorCategory, HandoffError};
pub use events::{HandoffEvent, QueueStats, SlaSeverity, TicketSummary};
pub use ticket::{
    Actor, AssignmentMethod, AssignmentRecord, EscalationRecord, Feedback, PriorityLevel,
    SlaRecord, Ticket, TicketStatus, DEFAULT_PRIORITY,
};
pub use types::{
    AgentId, CompletionRequest, ConversationId, MessageId, QueuedMessage, Role,
    SessionId, TicketId, Turn, UserId,
};

pub use traits::{
    AgentDirectory, CompletionBackend, Notifier, RateLimitStore, TicketStore, WindowCheck,
};
