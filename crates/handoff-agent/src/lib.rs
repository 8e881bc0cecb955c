// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The handoff decision engine.
//!
//! [`HandoffEngine`] is the entry point for inbound chat messages. It:
//! - Admits messages through the per-user rate limiter
//! - Buffers them in the bounded inbound queue and drains it immediately
//! - Routes users with an open ticket to their agent or queue status
//! - Opens a ticket when the user asks for a human or the AI is unavailable
//! - Otherwise answers through the response provider with recent context

pub mod decision;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use handoff_config::HandoffConfig;
use handoff_context::ConversationContext;
use handoff_core::{
    AgentDirectory, CapacityKind, CompletionRequest, ConversationId, HandoffError, HandoffEvent,
    MessageId, Notifier, QueuedMessage, Role, SessionId, Ticket, TicketStatus, TicketStore,
    Turn, UserId,
};
use handoff_queue::InboundQueue;
use handoff_ratelimit::{InMemoryRateLimitStore, RateLimiter};
use handoff_resilience::ResponseProvider;
use handoff_ticket::{NewTicket, TicketLifecycle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use crate::decision::HandoffPolicy;

/// Attempts after which a message that keeps failing is dropped.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Language assumed when the client sends none.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Outcome of [`HandoffEngine::submit_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Queued (and usually already processed).
    Accepted {
        message_id: MessageId,
        /// 1-based position at enqueue time.
        queue_position: usize,
    },
    /// Turned away; the client may retry later.
    Rejected(CapacityKind),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted { .. })
    }
}

/// Side effects already committed for a message whose handling failed
/// part-way, so a redelivery does not repeat them.
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    user_turn_recorded: bool,
    /// Set once the AI reply went out; holds its handoff flag.
    replied: Option<bool>,
}

/// Components the engine is assembled from.
pub struct EngineParts {
    pub limiter: Arc<RateLimiter>,
    pub queue: Arc<InboundQueue>,
    pub context: Arc<ConversationContext>,
    pub provider: Arc<ResponseProvider>,
    pub tickets: TicketLifecycle,
    pub notifier: Arc<dyn Notifier>,
    pub policy: HandoffPolicy,
    pub batch_size: usize,
    pub sweep_interval: Duration,
}

/// Admission, queuing, and the AI-vs-human decision for inbound messages.
pub struct HandoffEngine {
    limiter: Arc<RateLimiter>,
    queue: Arc<InboundQueue>,
    context: Arc<ConversationContext>,
    provider: Arc<ResponseProvider>,
    tickets: TicketLifecycle,
    notifier: Arc<dyn Notifier>,
    policy: HandoffPolicy,
    batch_size: usize,
    sweep_interval: Duration,
    in_flight: DashMap<MessageId, Progress>,
}

impl HandoffEngine {
    pub fn new(parts: EngineParts) -> Self {
        Self {
            limiter: parts.limiter,
            queue: parts.queue,
            context: parts.context,
            provider: parts.provider,
            tickets: parts.tickets,
            notifier: parts.notifier,
            policy: parts.policy,
            batch_size: parts.batch_size.max(1),
            sweep_interval: parts.sweep_interval,
            in_flight: DashMap::new(),
        }
    }

    /// Wires an engine from configuration around the given collaborators.
    ///
    /// Rate-limit windows live in process memory.
    pub fn from_config(
        config: &HandoffConfig,
        provider: ResponseProvider,
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn AgentDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let limiter = RateLimiter::from_config(
            &config.rate_limit,
            Arc::new(InMemoryRateLimitStore::new()),
        );
        let tickets = TicketLifecycle::new(store, directory, Arc::clone(&notifier), config.sla.clone());

        info!(
            service = config.service.name.as_str(),
            backends = provider.backend_names().len(),
            queue_capacity = config.queue.capacity,
            "handoff engine initialized"
        );

        Self::new(EngineParts {
            limiter: Arc::new(limiter),
            queue: Arc::new(InboundQueue::from_config(&config.queue)),
            context: Arc::new(ConversationContext::from_config(
                &config.session,
                &config.handoff,
            )),
            provider: Arc::new(provider),
            tickets,
            notifier,
            policy: HandoffPolicy::from_config(&config.handoff),
            batch_size: config.queue.batch_size,
            sweep_interval: config.session.sweep_interval(),
        })
    }

    pub fn tickets(&self) -> &TicketLifecycle {
        &self.tickets
    }

    pub fn context(&self) -> &Arc<ConversationContext> {
        &self.context
    }

    pub fn queue(&self) -> &Arc<InboundQueue> {
        &self.queue
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn provider(&self) -> &Arc<ResponseProvider> {
        &self.provider
    }

    /// Accepts an inbound chat message.
    ///
    /// Rate-limit and queue-capacity rejections are returned as
    /// [`Submission::Rejected`]; only invalid input is an error.
    pub async fn submit_message(
        &self,
        user_id: UserId,
        session_id: SessionId,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Submission, HandoffError> {
        let text = text.into();
        let mut language = language.into();
        if user_id.as_str().trim().is_empty() {
            return Err(HandoffError::Validation("user id must not be empty".into()));
        }
        if session_id.as_str().trim().is_empty() {
            return Err(HandoffError::Validation("session id must not be empty".into()));
        }
        if text.trim().is_empty() {
            return Err(HandoffError::Validation("message text must not be empty".into()));
        }
        if language.trim().is_empty() {
            language = DEFAULT_LANGUAGE.to_string();
        }

        let decision = self.limiter.admit(&user_id).await;
        if !decision.allowed {
            let retry_after = decision.retry_after.unwrap_or(Duration::from_secs(1));
            info!(
                user_id = %user_id,
                retry_after_secs = retry_after.as_secs(),
                "message rejected by rate limiter"
            );
            return Ok(Submission::Rejected(CapacityKind::RateLimited { retry_after }));
        }

        let message = QueuedMessage::new(user_id, session_id, text, language);
        let message_id = message.id.clone();
        let queue_position = match self.queue.enqueue(message).await {
            Ok(position) => position,
            Err(HandoffError::Capacity(kind)) => return Ok(Submission::Rejected(kind)),
            Err(e) => return Err(e),
        };
        debug!(message_id = %message_id, queue_position, "message queued");

        self.drain().await;
        Ok(Submission::Accepted {
            message_id,
            queue_position,
        })
    }

    /// Processes up to one batch of queued messages, returning how many succeeded.
    ///
    /// A failing message is put back at the tail of the queue and ends the batch.
    pub async fn drain(&self) -> usize {
        match self
            .queue
            .process_queue(|message| self.process(message), self.batch_size)
            .await
        {
            Ok(processed) => processed,
            Err(e) => {
                warn!(error = %e, "queue drain stopped early");
                0
            }
        }
    }

    /// Starts the idle-session sweeper; it stops when `cancel` fires.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.context.spawn_sweeper(self.sweep_interval, cancel)
    }

    /// Processes what is left in the queue within `timeout`, then stops all SLA timers.
    pub async fn shutdown(&self, timeout: Duration) {
        shutdown::drain_queue(self, timeout).await;
        self.tickets.shutdown();
        info!("handoff engine stopped");
    }

    async fn process(&self, message: QueuedMessage) -> Result<(), HandoffError> {
        if message.attempts >= MAX_DELIVERY_ATTEMPTS {
            error!(
                message_id = %message.id,
                user_id = %message.user_id,
                attempts = message.attempts,
                "dropping message after repeated failures"
            );
            self.in_flight.remove(&message.id);
            return Ok(());
        }

        let id = message.id.clone();
        let result = self.handle(message).await;
        if result.is_ok() {
            self.in_flight.remove(&id);
        }
        result
    }

    fn progress(&self, id: &MessageId) -> Progress {
        self.in_flight.get(id).map(|p| *p).unwrap_or_default()
    }

    fn commit(&self, id: &MessageId, step: impl FnOnce(&mut Progress)) {
        step(&mut self.in_flight.entry(id.clone()).or_default());
    }

    /// Records the user's turn once per message, however often it is redelivered.
    fn record_user_turn(
        &self,
        id: &MessageId,
        session_id: &SessionId,
        text: &str,
    ) -> Result<(), HandoffError> {
        if self.progress(id).user_turn_recorded {
            return Ok(());
        }
        self.context.append(session_id, Turn::user(text))?;
        self.commit(id, |p| p.user_turn_recorded = true);
        Ok(())
    }

    async fn handle(&self, message: QueuedMessage) -> Result<(), HandoffError> {
        let QueuedMessage {
            id,
            user_id,
            session_id,
            text,
            language,
            attempts,
            ..
        } = message;
        debug!(message_id = %id, user_id = %user_id, session_id = %session_id, attempts, "processing message");

        self.context.open(&user_id, &session_id, &language);
        if self.context.is_reset_utterance(&text) {
            self.context.clear(&session_id);
            info!(session_id = %session_id, "conversation context reset by user");
            self.emit(HandoffEvent::ContextReset {
                user_id,
                session_id,
                timestamp: Utc::now(),
            })
            .await;
            return Ok(());
        }

        if let Some(ticket) = self.tickets.open_ticket_for_user(&user_id).await? {
            self.record_user_turn(&id, &session_id, &text)?;
            return self.route_to_ticket(ticket, session_id, text).await;
        }

        let progress = self.progress(&id);
        let mut history = self
            .context
            .recent_within_budget(&session_id, self.context.token_budget());
        if progress.user_turn_recorded
            && history
                .last()
                .is_some_and(|t| t.role == Role::User && t.text == text)
        {
            history.pop();
        }
        self.record_user_turn(&id, &session_id, &text)?;

        if self.policy.wants_human(&text) {
            info!(user_id = %user_id, "user asked for a human agent");
            return self
                .open_ticket(
                    &user_id,
                    &session_id,
                    self.policy.request_priority,
                    decision::USER_REQUEST_REASON,
                )
                .await;
        }

        let should_handoff = match progress.replied {
            Some(should_handoff) => should_handoff,
            None => {
                let response = self
                    .provider
                    .generate(&CompletionRequest {
                        prompt: text,
                        history,
                        language,
                    })
                    .await;
                self.context
                    .append(&session_id, Turn::assistant(response.text.clone()))?;
                let should_handoff = response.should_handoff;
                self.emit(HandoffEvent::AssistantReply {
                    user_id: user_id.clone(),
                    session_id: session_id.clone(),
                    text: response.text,
                    confidence: response.confidence,
                    provider: response.provider,
                    timestamp: Utc::now(),
                })
                .await;
                self.commit(&id, |p| p.replied = Some(should_handoff));
                should_handoff
            }
        };

        if should_handoff {
            self.open_ticket(
                &user_id,
                &session_id,
                self.policy.provider_failure_priority,
                decision::PROVIDER_FAILURE_REASON,
            )
            .await?;
        }
        Ok(())
    }

    /// Forwards a message from a user who already has an open ticket.
    async fn route_to_ticket(
        &self,
        ticket: Ticket,
        session_id: SessionId,
        text: String,
    ) -> Result<(), HandoffError> {
        match (ticket.status, ticket.assigned_agent.clone()) {
            (TicketStatus::Assigned, Some(agent_id)) => {
                debug!(ticket_id = %ticket.id, agent_id = %agent_id, "routing message to agent");
                self.emit(HandoffEvent::AgentMessage {
                    ticket_id: ticket.id,
                    agent_id,
                    user_id: ticket.user_id,
                    text,
                    timestamp: Utc::now(),
                })
                .await;
            }
            _ => {
                let queue_position = self.tickets.queue_position(&ticket.id).await?;
                debug!(ticket_id = %ticket.id, queue_position, "user still waiting for an agent");
                self.emit(HandoffEvent::QueuedAcknowledgement {
                    ticket_id: ticket.id,
                    user_id: ticket.user_id,
                    session_id,
                    queue_position,
                    timestamp: Utc::now(),
                })
                .await;
            }
        }
        Ok(())
    }

    async fn open_ticket(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        priority: u8,
        reason: &str,
    ) -> Result<(), HandoffError> {
        let request = NewTicket::new(user_id.clone(), ConversationId::from(session_id), reason)
            .with_priority(priority)
            .with_context(self.context.recent(session_id));

        match self.tickets.create(request).await {
            Ok(ticket) => {
                info!(ticket_id = %ticket.id, user_id = %user_id, reason, "handed off to a human");
                Ok(())
            }
            Err(HandoffError::DuplicateOpenTicket {
                existing_ticket_id, ..
            }) => {
                debug!(existing_ticket_id = %existing_ticket_id, "ticket already open for conversation");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn emit(&self, event: HandoffEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.notifier.notify(event).await {
            warn!(event_type, error = %e, "notification failed, dropping event");
        }
    }
}
