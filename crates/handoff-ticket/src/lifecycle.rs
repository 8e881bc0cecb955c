// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ticket state machine.
//!
//! ```text
//! waiting ──assign──▶ assigned ──resolve──▶ resolved
//!    │                 │   ▲ │
//!    │                 │   └─┘ transfer
//!    │                 └──unassign──▶ waiting
//!    └──cancel──▶ cancelled
//! ```
//!
//! Every mutation of an existing ticket runs under that ticket's lock, and
//! creation runs under a lock for its (user, conversation) pair, which is
//! what keeps the one-open-ticket invariant under concurrent callers.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use handoff_config::SlaConfig;
use handoff_core::{
    Actor, AgentDirectory, AgentId, AssignmentMethod, AssignmentRecord, ConversationId,
    EscalationRecord, Feedback, HandoffError, HandoffEvent, Notifier, PriorityLevel, QueueStats,
    SlaRecord, Ticket, TicketId, TicketStatus, TicketStore, TicketSummary, Turn, UserId,
    DEFAULT_PRIORITY,
};
use tracing::{debug, info, warn};

use crate::locks::KeyedLocks;
use crate::sla::{self, SlaTimers};
use crate::stats;

/// Input to [`TicketLifecycle::create`].
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub reason: String,
    /// 1 (lowest) to 5 (emergency); defaults to 3.
    pub priority: Option<u8>,
    /// Recent turns to hand to the agent.
    pub context: Vec<Turn>,
}

impl NewTicket {
    pub fn new(
        user_id: UserId,
        conversation_id: ConversationId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            conversation_id,
            reason: reason.into(),
            priority: None,
            context: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_context(mut self, context: Vec<Turn>) -> Self {
        self.context = context;
        self
    }
}

/// Creates and drives tickets through their lifecycle.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct TicketLifecycle {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) store: Arc<dyn TicketStore>,
    pub(crate) directory: Arc<dyn AgentDirectory>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) sla: SlaConfig,
    create_locks: KeyedLocks<(UserId, ConversationId)>,
    pub(crate) ticket_locks: KeyedLocks<TicketId>,
    pub(crate) timers: DashMap<TicketId, SlaTimers>,
}

impl TicketLifecycle {
    pub fn new(
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn AgentDirectory>,
        notifier: Arc<dyn Notifier>,
        sla: SlaConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                directory,
                notifier,
                sla,
                create_locks: KeyedLocks::new(),
                ticket_locks: KeyedLocks::new(),
                timers: DashMap::new(),
            }),
        }
    }

    /// Opens a ticket and starts its SLA timers.
    ///
    /// Fails with [`HandoffError::DuplicateOpenTicket`] if the user already
    /// has a waiting or assigned ticket in this conversation.
    pub async fn create(&self, request: NewTicket) -> Result<Ticket, HandoffError> {
        let priority = request.priority.unwrap_or(DEFAULT_PRIORITY);
        if !(1..=5).contains(&priority) {
            return Err(HandoffError::Validation(format!(
                "priority must be between 1 and 5, got {priority}"
            )));
        }
        if request.user_id.as_str().trim().is_empty() {
            return Err(HandoffError::Validation("user id must not be empty".into()));
        }
        if request.reason.trim().is_empty() {
            return Err(HandoffError::Validation("reason must not be empty".into()));
        }

        let key = (request.user_id.clone(), request.conversation_id.clone());
        let create_guard = self.inner.create_locks.lock(&key).await;

        if let Some(existing) = self
            .inner
            .store
            .find_open(&request.user_id, &request.conversation_id)
            .await?
        {
            debug!(
                user_id = %request.user_id,
                existing_ticket_id = %existing.id,
                "open ticket already exists"
            );
            return Err(HandoffError::DuplicateOpenTicket {
                user_id: request.user_id.to_string(),
                conversation_id: request.conversation_id.to_string(),
                existing_ticket_id: existing.id.to_string(),
            });
        }

        let ticket = self.build_ticket(request, priority);
        let ticket_guard = self.inner.ticket_locks.lock(&ticket.id).await;
        self.inner.store.insert(&ticket).await?;
        sla::schedule(&self.inner, &ticket);
        drop(ticket_guard);
        drop(create_guard);
        self.inner.create_locks.prune();

        let position = self.queue_position(&ticket.id).await?;
        info!(
            ticket_id = %ticket.id,
            user_id = %ticket.user_id,
            priority = ticket.priority,
            level = %ticket.priority_level,
            queue_position = position,
            "ticket created"
        );
        self.inner
            .emit(HandoffEvent::TicketCreated {
                ticket: TicketSummary::from(&ticket),
                queue_position: position,
                timestamp: Utc::now(),
            })
            .await;
        self.inner.broadcast_stats().await;
        Ok(ticket)
    }

    /// Gives a waiting ticket to an authorized agent.
    pub async fn assign(
        &self,
        ticket_id: &TicketId,
        agent_id: &AgentId,
        method: AssignmentMethod,
    ) -> Result<Ticket, HandoffError> {
        self.ensure_authorized(agent_id).await?;

        let _guard = self.inner.ticket_locks.lock(ticket_id).await;
        let mut ticket = self.inner.load(ticket_id).await?;
        if ticket.status != TicketStatus::Waiting {
            return Err(HandoffError::NotAssignable {
                ticket_id: ticket_id.to_string(),
                status: ticket.status.to_string(),
            });
        }

        let now = Utc::now();
        ticket.assignment_history.push(AssignmentRecord {
            agent_id: agent_id.clone(),
            method,
            assigned_at: now,
            unassigned_at: None,
            reason: None,
        });
        ticket.status = TicketStatus::Assigned;
        ticket.assigned_agent = Some(agent_id.clone());
        ticket.updated_at = now;
        self.inner.store.update(&ticket).await?;

        info!(ticket_id = %ticket_id, agent_id = %agent_id, method = %method, "ticket assigned");
        self.inner
            .emit(HandoffEvent::TicketAssigned {
                ticket: TicketSummary::from(&ticket),
                agent_id: agent_id.clone(),
                method,
                timestamp: now,
            })
            .await;
        self.inner.broadcast_stats().await;
        Ok(ticket)
    }

    /// Closes an assigned ticket. Only the current holder may resolve it.
    pub async fn resolve(
        &self,
        ticket_id: &TicketId,
        agent_id: &AgentId,
        notes: Option<String>,
    ) -> Result<Ticket, HandoffError> {
        let guard = self.inner.ticket_locks.lock(ticket_id).await;
        let mut ticket = self.inner.load(ticket_id).await?;
        if ticket.status != TicketStatus::Assigned {
            return Err(invalid_state(&ticket, "resolve"));
        }
        if !ticket.is_held_by(agent_id) {
            return Err(not_holder(agent_id, &ticket));
        }

        let now = Utc::now();
        ticket.resolution_time_ms = ticket
            .current_assignment()
            .map(|a| (now - a.assigned_at).num_milliseconds());
        ticket.close_current_assignment(now, Some("resolved".to_string()));
        ticket.status = TicketStatus::Resolved;
        ticket.assigned_agent = None;
        ticket.resolution_notes = notes;
        ticket.resolved_at = Some(now);
        ticket.updated_at = now;
        self.inner.store.update(&ticket).await?;
        sla::cancel(&self.inner, ticket_id);
        drop(guard);

        info!(
            ticket_id = %ticket_id,
            agent_id = %agent_id,
            resolution_time_ms = ticket.resolution_time_ms,
            "ticket resolved"
        );
        self.inner
            .emit(HandoffEvent::TicketResolved {
                ticket: TicketSummary::from(&ticket),
                agent_id: agent_id.clone(),
                resolution_time_ms: ticket.resolution_time_ms,
                timestamp: now,
            })
            .await;
        self.request_feedback(&ticket);
        self.inner.broadcast_stats().await;
        self.inner.ticket_locks.prune();
        Ok(ticket)
    }

    /// Hands an assigned ticket from its holder to another authorized agent.
    pub async fn transfer(
        &self,
        ticket_id: &TicketId,
        from_agent: &AgentId,
        to_agent: &AgentId,
        reason: impl Into<String>,
    ) -> Result<Ticket, HandoffError> {
        let reason = reason.into();
        if from_agent == to_agent {
            return Err(HandoffError::Validation(
                "cannot transfer a ticket to its current holder".into(),
            ));
        }
        self.ensure_authorized(to_agent).await?;

        let _guard = self.inner.ticket_locks.lock(ticket_id).await;
        let mut ticket = self.inner.load(ticket_id).await?;
        if ticket.status != TicketStatus::Assigned {
            return Err(invalid_state(&ticket, "transfer"));
        }
        if !ticket.is_held_by(from_agent) {
            return Err(not_holder(from_agent, &ticket));
        }

        let now = Utc::now();
        ticket.close_current_assignment(now, Some(reason.clone()));
        ticket.assignment_history.push(AssignmentRecord {
            agent_id: to_agent.clone(),
            method: AssignmentMethod::Transfer,
            assigned_at: now,
            unassigned_at: None,
            reason: None,
        });
        ticket.assigned_agent = Some(to_agent.clone());
        ticket.updated_at = now;
        self.inner.store.update(&ticket).await?;

        info!(
            ticket_id = %ticket_id,
            from_agent = %from_agent,
            to_agent = %to_agent,
            "ticket transferred"
        );
        self.inner
            .emit(HandoffEvent::TicketTransferred {
                ticket: TicketSummary::from(&ticket),
                from_agent: from_agent.clone(),
                to_agent: to_agent.clone(),
                reason,
                timestamp: now,
            })
            .await;
        self.inner.broadcast_stats().await;
        Ok(ticket)
    }

    /// Returns an assigned ticket to the waiting queue.
    pub async fn unassign(
        &self,
        ticket_id: &TicketId,
        agent_id: &AgentId,
        reason: Option<String>,
    ) -> Result<Ticket, HandoffError> {
        let _guard = self.inner.ticket_locks.lock(ticket_id).await;
        let mut ticket = self.inner.load(ticket_id).await?;
        if ticket.status != TicketStatus::Assigned {
            return Err(invalid_state(&ticket, "unassign"));
        }
        if !ticket.is_held_by(agent_id) {
            return Err(not_holder(agent_id, &ticket));
        }

        let now = Utc::now();
        ticket.close_current_assignment(now, reason.clone());
        ticket.status = TicketStatus::Waiting;
        ticket.assigned_agent = None;
        ticket.updated_at = now;
        self.inner.store.update(&ticket).await?;

        info!(ticket_id = %ticket_id, agent_id = %agent_id, "ticket returned to queue");
        self.inner
            .emit(HandoffEvent::TicketUnassigned {
                ticket: TicketSummary::from(&ticket),
                agent_id: agent_id.clone(),
                reason,
                timestamp: now,
            })
            .await;
        self.inner.broadcast_stats().await;
        Ok(ticket)
    }

    /// Withdraws a waiting ticket and stops its SLA timers.
    pub async fn cancel(
        &self,
        ticket_id: &TicketId,
        cancelled_by: Actor,
        reason: Option<String>,
    ) -> Result<Ticket, HandoffError> {
        let guard = self.inner.ticket_locks.lock(ticket_id).await;
        let mut ticket = self.inner.load(ticket_id).await?;
        if ticket.status != TicketStatus::Waiting {
            return Err(invalid_state(&ticket, "cancel"));
        }

        let now = Utc::now();
        ticket.status = TicketStatus::Cancelled;
        ticket.updated_at = now;
        self.inner.store.update(&ticket).await?;
        sla::cancel(&self.inner, ticket_id);
        drop(guard);

        info!(ticket_id = %ticket_id, cancelled_by = %cancelled_by, "ticket cancelled");
        self.inner
            .emit(HandoffEvent::TicketCancelled {
                ticket: TicketSummary::from(&ticket),
                cancelled_by,
                reason,
                timestamp: now,
            })
            .await;
        self.inner.broadcast_stats().await;
        self.inner.ticket_locks.prune();
        Ok(ticket)
    }

    /// Raises the escalation level of an open ticket.
    ///
    /// The first escalation lifts the ticket to `High`; every later one to
    /// `Emergency`. `escalated_by` defaults to the system.
    pub async fn escalate(
        &self,
        ticket_id: &TicketId,
        reason: impl Into<String>,
        escalated_by: Option<Actor>,
    ) -> Result<Ticket, HandoffError> {
        let _guard = self.inner.ticket_locks.lock(ticket_id).await;
        let ticket = self.inner.load(ticket_id).await?;
        let ticket = self
            .inner
            .escalate_locked(ticket, reason.into(), escalated_by.unwrap_or(Actor::System))
            .await?;
        self.inner.broadcast_stats().await;
        Ok(ticket)
    }

    /// Records the user's rating of a resolved ticket. Accepted once.
    pub async fn submit_feedback(
        &self,
        ticket_id: &TicketId,
        user_id: &UserId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Ticket, HandoffError> {
        if !(1..=5).contains(&rating) {
            return Err(HandoffError::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }

        let _guard = self.inner.ticket_locks.lock(ticket_id).await;
        let mut ticket = self.inner.load(ticket_id).await?;
        if ticket.user_id != *user_id {
            return Err(HandoffError::Validation(
                "feedback must come from the ticket's owner".into(),
            ));
        }
        if ticket.status != TicketStatus::Resolved || ticket.feedback.is_some() {
            return Err(invalid_state(&ticket, "submit feedback for"));
        }

        let now = Utc::now();
        ticket.feedback = Some(Feedback {
            rating,
            comment,
            submitted_at: now,
        });
        ticket.updated_at = now;
        self.inner.store.update(&ticket).await?;
        info!(ticket_id = %ticket_id, rating, "feedback recorded");
        Ok(ticket)
    }

    pub async fn get(&self, ticket_id: &TicketId) -> Result<Ticket, HandoffError> {
        self.inner.load(ticket_id).await
    }

    /// The user's most recent waiting or assigned ticket, in any conversation.
    pub async fn open_ticket_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Ticket>, HandoffError> {
        self.inner.store.find_open_for_user(user_id).await
    }

    /// Waiting tickets served before this one (0 = next in line).
    pub async fn queue_position(&self, ticket_id: &TicketId) -> Result<usize, HandoffError> {
        let ticket = self.inner.load(ticket_id).await?;
        let waiting = self
            .inner
            .store
            .list_by_status(&[TicketStatus::Waiting])
            .await?;
        Ok(stats::queue_position(&ticket, &waiting))
    }

    pub async fn queue_stats(&self) -> Result<QueueStats, HandoffError> {
        self.inner.queue_stats().await
    }

    /// Whether SLA timers are still pending for a ticket.
    pub fn has_pending_timers(&self, ticket_id: &TicketId) -> bool {
        self.inner.timers.contains_key(ticket_id)
    }

    /// Number of tickets with pending SLA timers.
    pub fn pending_timer_count(&self) -> usize {
        self.inner.timers.len()
    }

    /// Aborts every pending SLA timer (process shutdown).
    pub fn shutdown(&self) {
        let ids: Vec<TicketId> = self.inner.timers.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            sla::cancel(&self.inner, id);
        }
        debug!(cancelled = ids.len(), "ticket timers stopped");
    }

    fn build_ticket(&self, request: NewTicket, priority: u8) -> Ticket {
        let now = Utc::now();
        let priority_level = PriorityLevel::from_priority(priority);
        let target = self.inner.sla.target(priority_level);
        Ticket {
            id: TicketId::generate(),
            user_id: request.user_id,
            conversation_id: request.conversation_id,
            status: TicketStatus::Waiting,
            priority,
            priority_level,
            reason: request.reason,
            context: request.context,
            sla: SlaRecord {
                response_deadline: now + chrono::Duration::minutes(target.response_minutes.into()),
                resolution_deadline: now
                    + chrono::Duration::minutes(target.resolution_minutes.into()),
                escalation_level: 0,
                is_overdue: false,
            },
            assignment_history: Vec::new(),
            assigned_agent: None,
            escalation_history: Vec::new(),
            resolution_notes: None,
            resolved_at: None,
            resolution_time_ms: None,
            feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn ensure_authorized(&self, agent_id: &AgentId) -> Result<(), HandoffError> {
        if self.inner.directory.is_authorized(agent_id).await? {
            Ok(())
        } else {
            Err(HandoffError::Unauthorized {
                agent_id: agent_id.to_string(),
                reason: "agent is not on the roster".into(),
            })
        }
    }

    fn request_feedback(&self, ticket: &Ticket) {
        let inner = Arc::clone(&self.inner);
        let event = HandoffEvent::FeedbackRequested {
            ticket_id: ticket.id.clone(),
            user_id: ticket.user_id.clone(),
            timestamp: Utc::now(),
        };
        tokio::spawn(async move { inner.emit(event).await });
    }
}

impl Inner {
    pub(crate) async fn load(&self, ticket_id: &TicketId) -> Result<Ticket, HandoffError> {
        self.store
            .get(ticket_id)
            .await?
            .ok_or_else(|| HandoffError::ticket_not_found(ticket_id.as_str()))
    }

    /// Escalates a ticket whose lock the caller already holds.
    pub(crate) async fn escalate_locked(
        &self,
        mut ticket: Ticket,
        reason: String,
        escalated_by: Actor,
    ) -> Result<Ticket, HandoffError> {
        if ticket.status.is_terminal() {
            return Err(invalid_state(&ticket, "escalate"));
        }

        let now = Utc::now();
        let level = ticket.sla.escalation_level + 1;
        ticket.sla.escalation_level = level;
        if level == 1 {
            ticket.priority_level = ticket.priority_level.max(PriorityLevel::High);
            ticket.priority = ticket.priority.max(4);
        } else {
            ticket.priority_level = PriorityLevel::Emergency;
            ticket.priority = 5;
        }
        ticket.escalation_history.push(EscalationRecord {
            level,
            reason: reason.clone(),
            escalated_by: escalated_by.clone(),
            escalated_at: now,
        });
        ticket.updated_at = now;
        self.store.update(&ticket).await?;

        warn!(
            ticket_id = %ticket.id,
            level,
            priority_level = %ticket.priority_level,
            escalated_by = %escalated_by,
            reason = %reason,
            "ticket escalated"
        );
        self.emit(HandoffEvent::TicketEscalated {
            ticket: TicketSummary::from(&ticket),
            level,
            reason,
            escalated_by,
            timestamp: now,
        })
        .await;
        Ok(ticket)
    }

    /// Delivers an event; failures are logged and dropped.
    pub(crate) async fn emit(&self, event: HandoffEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.notifier.notify(event).await {
            warn!(event_type, error = %e, "notification failed, dropping event");
        }
    }

    pub(crate) async fn queue_stats(&self) -> Result<QueueStats, HandoffError> {
        let open = self
            .store
            .list_by_status(&[TicketStatus::Waiting, TicketStatus::Assigned])
            .await?;
        Ok(stats::compute_stats(&open, Utc::now()))
    }

    pub(crate) async fn broadcast_stats(&self) {
        match self.queue_stats().await {
            Ok(stats) => {
                self.emit(HandoffEvent::QueueStatsUpdated {
                    stats,
                    timestamp: Utc::now(),
                })
                .await
            }
            Err(e) => warn!(error = %e, "failed to compute queue statistics"),
        }
    }

    /// Assignee first, then supervisors, without duplicates.
    pub(crate) async fn sla_recipients(&self, ticket: &Ticket) -> Vec<AgentId> {
        let mut recipients: Vec<AgentId> = ticket.assigned_agent.iter().cloned().collect();
        match self.directory.supervisors().await {
            Ok(supervisors) => {
                for s in supervisors {
                    if !recipients.contains(&s) {
                        recipients.push(s);
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to load supervisors"),
        }
        recipients
    }
}

fn invalid_state(ticket: &Ticket, operation: &'static str) -> HandoffError {
    HandoffError::InvalidState {
        ticket_id: ticket.id.to_string(),
        status: ticket.status.to_string(),
        operation,
    }
}

fn not_holder(agent_id: &AgentId, ticket: &Ticket) -> HandoffError {
    HandoffError::Unauthorized {
        agent_id: agent_id.to_string(),
        reason: format!("agent does not hold ticket {}", ticket.id),
    }
}
