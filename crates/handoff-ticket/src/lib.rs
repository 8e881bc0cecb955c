// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket lifecycle for human handoff.
//!
//! [`TicketLifecycle`] owns the ticket state machine, the one-open-ticket
//! rule, SLA timers with automatic escalation, and queue statistics. Storage,
//! the agent roster, and event delivery are injected through the
//! `handoff-core` traits; [`memory`] has process-local implementations.

pub mod lifecycle;
mod locks;
pub mod memory;
pub mod sla;
pub mod stats;

pub use lifecycle::{NewTicket, TicketLifecycle};
pub use memory::{InMemoryTicketStore, StaticAgentDirectory};
pub use sla::BREACH_ESCALATION_REASON;
pub use stats::{compute_stats, queue_position};
