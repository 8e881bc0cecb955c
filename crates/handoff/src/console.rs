// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line protocol for the stdin console.
//!
//! Chat messages are `user|session|text`. Lines starting with `/` are agent
//! and operator commands:
//!
//! ```text
//! /assign <ticket> <agent>
//! /resolve <ticket> <agent> [notes...]
//! /transfer <ticket> <from> <to> <reason...>
//! /unassign <ticket> <agent>
//! /escalate <ticket> <reason...>
//! /cancel <ticket> <user>
//! /feedback <ticket> <user> <rating> [comment...]
//! /disconnect <session>
//! /stats
//! /breakers
//! ```

use handoff_agent::{HandoffEngine, Submission};
use handoff_core::{
    Actor, AgentId, AssignmentMethod, HandoffError, SessionId, TicketId, UserId,
};
use tracing::{info, warn};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Message {
        user_id: UserId,
        session_id: SessionId,
        text: String,
    },
    Assign {
        ticket_id: TicketId,
        agent_id: AgentId,
    },
    Resolve {
        ticket_id: TicketId,
        agent_id: AgentId,
        notes: Option<String>,
    },
    Transfer {
        ticket_id: TicketId,
        from: AgentId,
        to: AgentId,
        reason: String,
    },
    Unassign {
        ticket_id: TicketId,
        agent_id: AgentId,
    },
    Escalate {
        ticket_id: TicketId,
        reason: String,
    },
    Cancel {
        ticket_id: TicketId,
        user_id: UserId,
    },
    Feedback {
        ticket_id: TicketId,
        user_id: UserId,
        rating: u8,
        comment: Option<String>,
    },
    /// The client closed the session; its context is dropped.
    Disconnect {
        session_id: SessionId,
    },
    Stats,
    Breakers,
}

fn usage(command: &str, args: &str) -> HandoffError {
    HandoffError::Validation(format!("usage: /{command} {args}"))
}

/// Joins trailing words, `None` when there are none.
fn rest(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Parses one line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, HandoffError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    if let Some(command) = line.strip_prefix('/') {
        return parse_command(command).map(Some);
    }

    let mut parts = line.splitn(3, '|');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(session), Some(text)) => Ok(Some(ConsoleCommand::Message {
            user_id: UserId::from(user.trim()),
            session_id: SessionId::from(session.trim()),
            text: text.trim().to_string(),
        })),
        _ => Err(HandoffError::Validation(
            "expected `user|session|text` or a /command".into(),
        )),
    }
}

fn parse_command(command: &str) -> Result<ConsoleCommand, HandoffError> {
    let words: Vec<&str> = command.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Err(HandoffError::Validation("empty command".into()));
    };

    match name {
        "assign" => match args {
            [ticket, agent] => Ok(ConsoleCommand::Assign {
                ticket_id: TicketId::from(*ticket),
                agent_id: AgentId::from(*agent),
            }),
            _ => Err(usage(name, "<ticket> <agent>")),
        },
        "resolve" => match args {
            [ticket, agent, notes @ ..] => Ok(ConsoleCommand::Resolve {
                ticket_id: TicketId::from(*ticket),
                agent_id: AgentId::from(*agent),
                notes: rest(notes),
            }),
            _ => Err(usage(name, "<ticket> <agent> [notes...]")),
        },
        "transfer" => match args {
            [ticket, from, to, reason @ ..] if !reason.is_empty() => {
                Ok(ConsoleCommand::Transfer {
                    ticket_id: TicketId::from(*ticket),
                    from: AgentId::from(*from),
                    to: AgentId::from(*to),
                    reason: reason.join(" "),
                })
            }
            _ => Err(usage(name, "<ticket> <from> <to> <reason...>")),
        },
        "unassign" => match args {
            [ticket, agent] => Ok(ConsoleCommand::Unassign {
                ticket_id: TicketId::from(*ticket),
                agent_id: AgentId::from(*agent),
            }),
            _ => Err(usage(name, "<ticket> <agent>")),
        },
        "escalate" => match args {
            [ticket, reason @ ..] if !reason.is_empty() => Ok(ConsoleCommand::Escalate {
                ticket_id: TicketId::from(*ticket),
                reason: reason.join(" "),
            }),
            _ => Err(usage(name, "<ticket> <reason...>")),
        },
        "cancel" => match args {
            [ticket, user] => Ok(ConsoleCommand::Cancel {
                ticket_id: TicketId::from(*ticket),
                user_id: UserId::from(*user),
            }),
            _ => Err(usage(name, "<ticket> <user>")),
        },
        "feedback" => match args {
            [ticket, user, rating, comment @ ..] => {
                let rating = rating.parse::<u8>().map_err(|_| {
                    HandoffError::Validation(format!("rating must be a number, got `{rating}`"))
                })?;
                Ok(ConsoleCommand::Feedback {
                    ticket_id: TicketId::from(*ticket),
                    user_id: UserId::from(*user),
                    rating,
                    comment: rest(comment),
                })
            }
            _ => Err(usage(name, "<ticket> <user> <rating> [comment...]")),
        },
        "disconnect" => match args {
            [session] => Ok(ConsoleCommand::Disconnect {
                session_id: SessionId::from(*session),
            }),
            _ => Err(usage(name, "<session>")),
        },
        "stats" => Ok(ConsoleCommand::Stats),
        "breakers" => Ok(ConsoleCommand::Breakers),
        other => Err(HandoffError::Validation(format!("unknown command `/{other}`"))),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, HandoffError> {
    serde_json::to_string(value).map_err(|e| HandoffError::Internal(format!("json encoding failed: {e}")))
}

/// Runs a command against the engine.
///
/// Returns a JSON line to print for commands that produce a report; ticket
/// operations report through the event stream instead.
pub async fn execute(
    engine: &HandoffEngine,
    command: ConsoleCommand,
) -> Result<Option<String>, HandoffError> {
    let tickets = engine.tickets();
    match command {
        ConsoleCommand::Message {
            user_id,
            session_id,
            text,
        } => {
            match engine
                .submit_message(user_id.clone(), session_id, text, "")
                .await?
            {
                Submission::Accepted { message_id, .. } => {
                    info!(user_id = %user_id, message_id = %message_id, "message accepted");
                }
                Submission::Rejected(kind) => {
                    warn!(user_id = %user_id, reason = %kind, "message rejected");
                }
            }
            Ok(None)
        }
        ConsoleCommand::Assign {
            ticket_id,
            agent_id,
        } => {
            tickets
                .assign(&ticket_id, &agent_id, AssignmentMethod::SelfAssign)
                .await?;
            Ok(None)
        }
        ConsoleCommand::Resolve {
            ticket_id,
            agent_id,
            notes,
        } => {
            tickets.resolve(&ticket_id, &agent_id, notes).await?;
            Ok(None)
        }
        ConsoleCommand::Transfer {
            ticket_id,
            from,
            to,
            reason,
        } => {
            tickets.transfer(&ticket_id, &from, &to, reason).await?;
            Ok(None)
        }
        ConsoleCommand::Unassign {
            ticket_id,
            agent_id,
        } => {
            tickets.unassign(&ticket_id, &agent_id, None).await?;
            Ok(None)
        }
        ConsoleCommand::Escalate { ticket_id, reason } => {
            tickets.escalate(&ticket_id, reason, None).await?;
            Ok(None)
        }
        ConsoleCommand::Cancel { ticket_id, user_id } => {
            tickets
                .cancel(&ticket_id, Actor::User(user_id), None)
                .await?;
            Ok(None)
        }
        ConsoleCommand::Feedback {
            ticket_id,
            user_id,
            rating,
            comment,
        } => {
            tickets
                .submit_feedback(&ticket_id, &user_id, rating, comment)
                .await?;
            Ok(None)
        }
        ConsoleCommand::Disconnect { session_id } => {
            if engine.context().remove(&session_id).is_some() {
                info!(session_id = %session_id, "session closed by client");
            } else {
                warn!(session_id = %session_id, "disconnect for unknown session");
            }
            Ok(None)
        }
        ConsoleCommand::Stats => to_json(&tickets.queue_stats().await?).map(Some),
        ConsoleCommand::Breakers => to_json(&engine.provider().breaker_snapshot()).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_line_splits_on_first_two_pipes() {
        let cmd = parse_line("citizen-1|s-1|is it a|b choice?").unwrap().unwrap();
        assert_eq!(
            cmd,
            ConsoleCommand::Message {
                user_id: UserId::from("citizen-1"),
                session_id: SessionId::from("s-1"),
                text: "is it a|b choice?".into(),
            }
        );
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# a note").unwrap(), None);
    }

    #[test]
    fn malformed_chat_line_is_rejected() {
        assert!(matches!(
            parse_line("citizen-1|hello"),
            Err(HandoffError::Validation(_))
        ));
    }

    #[test]
    fn resolve_notes_are_optional() {
        let cmd = parse_line("/resolve tkt-1 alice").unwrap().unwrap();
        assert!(matches!(cmd, ConsoleCommand::Resolve { notes: None, .. }));

        let cmd = parse_line("/resolve tkt-1 alice renewed the permit").unwrap().unwrap();
        match cmd {
            ConsoleCommand::Resolve { notes, agent_id, .. } => {
                assert_eq!(agent_id.as_str(), "alice");
                assert_eq!(notes.as_deref(), Some("renewed the permit"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn transfer_requires_a_reason() {
        assert!(parse_line("/transfer tkt-1 alice bob").is_err());
        let cmd = parse_line("/transfer tkt-1 alice bob needs billing").unwrap().unwrap();
        assert!(matches!(cmd, ConsoleCommand::Transfer { ref reason, .. } if reason == "needs billing"));
    }

    #[test]
    fn feedback_rating_must_be_numeric() {
        let err = parse_line("/feedback tkt-1 citizen-1 great").unwrap_err();
        assert!(err.to_string().contains("rating"));
        let cmd = parse_line("/feedback tkt-1 citizen-1 5 thanks").unwrap().unwrap();
        assert!(matches!(cmd, ConsoleCommand::Feedback { rating: 5, .. }));
    }

    #[test]
    fn disconnect_takes_one_session() {
        assert_eq!(
            parse_line("/disconnect s-1").unwrap(),
            Some(ConsoleCommand::Disconnect {
                session_id: SessionId::from("s-1"),
            })
        );
        assert!(parse_line("/disconnect").is_err());
        assert!(parse_line("/disconnect s-1 s-2").is_err());
    }

    #[tokio::test]
    async fn disconnect_drops_session_context() {
        let config = handoff_config::HandoffConfig::default();
        let engine = HandoffEngine::from_config(
            &config,
            handoff_resilience::ResponseProvider::from_config(&config.providers),
            std::sync::Arc::new(handoff_ticket::InMemoryTicketStore::new()),
            std::sync::Arc::new(handoff_ticket::StaticAgentDirectory::default()),
            handoff_bus::EventBus::new().shared(),
        );
        let line = parse_line("citizen-1|s-1|hello").unwrap().unwrap();
        execute(&engine, line).await.unwrap();
        assert!(!engine.context().recent(&SessionId::from("s-1")).is_empty());

        let line = parse_line("/disconnect s-1").unwrap().unwrap();
        assert_eq!(execute(&engine, line).await.unwrap(), None);
        assert!(engine.context().recent(&SessionId::from("s-1")).is_empty());
        assert!(engine.context().remove(&SessionId::from("s-1")).is_none());
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = parse_line("/reboot").unwrap_err();
        assert!(err.to_string().contains("/reboot"));
        assert_eq!(parse_line("/stats").unwrap(), Some(ConsoleCommand::Stats));
    }
}
