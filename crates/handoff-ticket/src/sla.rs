// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-ticket SLA timers.
//!
//! Each ticket gets two tasks: a warning at `warning_fraction` of the
//! response deadline and a breach at the deadline itself. Both hold only a
//! weak reference to the lifecycle, take the ticket lock before acting, and
//! do nothing once the ticket's registry entry is gone, so a timer can never
//! act on a ticket that was resolved or cancelled first.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use handoff_core::{Actor, HandoffEvent, SlaSeverity, Ticket, TicketId, TicketSummary};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::lifecycle::Inner;

/// Reason recorded on automatic escalations.
pub const BREACH_ESCALATION_REASON: &str = "SLA deadline exceeded";

/// Pending timer tasks for one ticket.
pub(crate) struct SlaTimers {
    warning: JoinHandle<()>,
    breach: JoinHandle<()>,
}

impl SlaTimers {
    fn abort(&self) {
        self.warning.abort();
        self.breach.abort();
    }
}

/// Starts the warning and breach timers for a freshly created ticket.
///
/// The caller holds the ticket lock.
pub(crate) fn schedule(inner: &Arc<Inner>, ticket: &Ticket) {
    let response = inner.sla.target(ticket.priority_level).response();
    let warn_after = response.mul_f64(inner.sla.warning_fraction);
    let deadline = Instant::now() + response;

    let warning = tokio::spawn(warning_timer(
        Arc::downgrade(inner),
        ticket.id.clone(),
        warn_after,
        deadline,
    ));
    let breach = tokio::spawn(breach_timer(
        Arc::downgrade(inner),
        ticket.id.clone(),
        deadline,
    ));

    debug!(
        ticket_id = %ticket.id,
        warn_after_secs = warn_after.as_secs(),
        deadline_secs = response.as_secs(),
        "SLA timers scheduled"
    );
    inner
        .timers
        .insert(ticket.id.clone(), SlaTimers { warning, breach });
}

/// Stops both timers of a ticket. Idempotent.
pub(crate) fn cancel(inner: &Inner, ticket_id: &TicketId) {
    if let Some((_, timers)) = inner.timers.remove(ticket_id) {
        timers.abort();
        debug!(ticket_id = %ticket_id, "SLA timers cancelled");
    }
}

async fn warning_timer(
    inner: Weak<Inner>,
    ticket_id: TicketId,
    after: Duration,
    deadline: Instant,
) {
    tokio::time::sleep(after).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };

    let guard = inner.ticket_locks.lock(&ticket_id).await;
    if !inner.timers.contains_key(&ticket_id) {
        return;
    }
    let ticket = match inner.load(&ticket_id).await {
        Ok(ticket) => ticket,
        Err(e) => {
            warn!(ticket_id = %ticket_id, error = %e, "SLA warning could not load ticket");
            return;
        }
    };
    if ticket.status.is_terminal() {
        return;
    }

    let remaining = deadline.saturating_duration_since(Instant::now());
    let severity = SlaSeverity::from_remaining(remaining);
    let recipients = inner.sla_recipients(&ticket).await;
    drop(guard);

    warn!(
        ticket_id = %ticket_id,
        remaining_secs = remaining.as_secs(),
        severity = ?severity,
        "SLA response deadline approaching"
    );
    inner
        .emit(HandoffEvent::SlaWarning {
            ticket: TicketSummary::from(&ticket),
            remaining_secs: i64::try_from(remaining.as_secs()).unwrap_or(i64::MAX),
            severity,
            recipients,
            timestamp: Utc::now(),
        })
        .await;
}

async fn breach_timer(inner: Weak<Inner>, ticket_id: TicketId, deadline: Instant) {
    tokio::time::sleep_until(deadline).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };

    let guard = inner.ticket_locks.lock(&ticket_id).await;
    if inner.timers.remove(&ticket_id).is_none() {
        return;
    }
    let mut ticket = match inner.load(&ticket_id).await {
        Ok(ticket) => ticket,
        Err(e) => {
            warn!(ticket_id = %ticket_id, error = %e, "SLA breach could not load ticket");
            return;
        }
    };
    if ticket.status.is_terminal() {
        return;
    }

    ticket.sla.is_overdue = true;
    ticket.updated_at = Utc::now();
    if let Err(e) = inner.store.update(&ticket).await {
        warn!(ticket_id = %ticket_id, error = %e, "failed to mark ticket overdue");
        return;
    }

    let recipients = inner.sla_recipients(&ticket).await;
    error!(
        ticket_id = %ticket_id,
        priority_level = %ticket.priority_level,
        status = %ticket.status,
        "SLA response deadline breached"
    );
    inner
        .emit(HandoffEvent::SlaBreach {
            ticket: TicketSummary::from(&ticket),
            recipients,
            timestamp: Utc::now(),
        })
        .await;

    if ticket.sla.escalation_level == 0 {
        if let Err(e) = inner
            .escalate_locked(ticket, BREACH_ESCALATION_REASON.to_string(), Actor::System)
            .await
        {
            warn!(ticket_id = %ticket_id, error = %e, "automatic escalation failed");
        }
    }
    drop(guard);
    inner.broadcast_stats().await;
}
