// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Handoff orchestration engine.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Handoff components and collaborator traits.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// Bad input, rejected before any state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// An agent attempted an operation it is not authorized for.
    #[error("agent `{agent_id}` is not authorized: {reason}")]
    Unauthorized { agent_id: String, reason: String },

    /// Unknown ticket, session, or other entity.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Operation illegal for the entity's current state.
    #[error("cannot {operation} ticket {ticket_id} in status `{status}`")]
    InvalidState {
        ticket_id: String,
        status: String,
        operation: &'static str,
    },

    /// Assignment attempted on a ticket that is not waiting.
    #[error("ticket {ticket_id} is not assignable (status `{status}`)")]
    NotAssignable { ticket_id: String, status: String },

    /// A bounded resource rejected the request.
    #[error("capacity exceeded: {0}")]
    Capacity(CapacityKind),

    /// Downstream text-generation backend failure.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An open ticket already exists for the (user, conversation) pair.
    #[error(
        "open ticket {existing_ticket_id} already exists for user {user_id} in conversation {conversation_id}"
    )]
    DuplicateOpenTicket {
        user_id: String,
        conversation_id: String,
        existing_ticket_id: String,
    },

    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Which bounded resource rejected a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityKind {
    /// The inbound queue is at capacity.
    QueueFull { capacity: usize },
    /// The sender exceeded a rate-limit window.
    RateLimited { retry_after: Duration },
}

impl std::fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityKind::QueueFull { capacity } => {
                write!(f, "inbound queue is full ({capacity} messages)")
            }
            CapacityKind::RateLimited { retry_after } => {
                write!(f, "rate limit exceeded, retry after {}s", retry_after.as_secs())
            }
        }
    }
}

/// Coarse classification of [`HandoffError`] used by callers to decide
/// whether to surface, retry, or discard an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    InvalidState,
    Capacity,
    Provider,
    Concurrency,
    Infrastructure,
}

impl HandoffError {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            HandoffError::Validation(_) | HandoffError::Unauthorized { .. } => {
                ErrorCategory::Validation
            }
            HandoffError::NotFound { .. } => ErrorCategory::NotFound,
            HandoffError::InvalidState { .. } | HandoffError::NotAssignable { .. } => {
                ErrorCategory::InvalidState
            }
            HandoffError::Capacity(_) => ErrorCategory::Capacity,
            HandoffError::Provider { .. } => ErrorCategory::Provider,
            HandoffError::DuplicateOpenTicket { .. } => ErrorCategory::Concurrency,
            HandoffError::Config(_)
            | HandoffError::Storage { .. }
            | HandoffError::Timeout { .. }
            | HandoffError::Internal(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HandoffError::Capacity(_) | HandoffError::Timeout { .. } | HandoffError::Storage { .. }
        )
    }

    /// Shorthand for a [`HandoffError::NotFound`] on a ticket.
    pub fn ticket_not_found(id: impl Into<String>) -> Self {
        HandoffError::NotFound {
            kind: "ticket",
            id: id.into(),
        }
    }

    /// Shorthand for a [`HandoffError::NotFound`] on a session.
    pub fn session_not_found(id: impl Into<String>) -> Self {
        HandoffError::NotFound {
            kind: "session",
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_the_taxonomy() {
        assert_eq!(
            HandoffError::Validation("x".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            HandoffError::ticket_not_found("t-1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            HandoffError::NotAssignable {
                ticket_id: "t-1".into(),
                status: "resolved".into(),
            }
            .category(),
            ErrorCategory::InvalidState
        );
        assert_eq!(
            HandoffError::Capacity(CapacityKind::QueueFull { capacity: 1 }).category(),
            ErrorCategory::Capacity
        );
        assert_eq!(
            HandoffError::DuplicateOpenTicket {
                user_id: "u".into(),
                conversation_id: "c".into(),
                existing_ticket_id: "t".into(),
            }
            .category(),
            ErrorCategory::Concurrency
        );
    }

    #[test]
    fn capacity_errors_are_retryable() {
        let full = HandoffError::Capacity(CapacityKind::QueueFull { capacity: 1000 });
        assert!(full.is_retryable());
        assert!(full.to_string().contains("1000"));
        assert!(!HandoffError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn rate_limited_display_mentions_retry_after() {
        let err = HandoffError::Capacity(CapacityKind::RateLimited {
            retry_after: Duration::from_secs(42),
        });
        assert!(err.to_string().contains("42s"));
    }
}
