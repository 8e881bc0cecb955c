// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the queue, context, provider, and ticket components.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of the citizen using the chat.
    UserId
);
string_id!(
    /// Identifier of an ephemeral conversation session.
    SessionId
);
string_id!(
    /// Durable conversation reference a ticket is attached to.
    ConversationId
);
string_id!(
    /// Identifier of a human support agent or supervisor.
    AgentId
);
string_id!(
    /// Identifier of a support ticket.
    TicketId
);
string_id!(
    /// Identifier of an inbound chat message.
    MessageId
);

impl TicketId {
    /// Generates a fresh random ticket id.
    pub fn generate() -> Self {
        Self(format!("tkt-{}", uuid::Uuid::new_v4()))
    }
}

impl MessageId {
    /// Generates a fresh random message id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl From<&SessionId> for ConversationId {
    fn from(session: &SessionId) -> Self {
        Self(session.0.clone())
    }
}

/// Author of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One immutable message within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A unit of inbound work waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: MessageId,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub text: String,
    pub language: String,
    pub enqueued_at: DateTime<Utc>,
    /// Free-form metadata such as the originating connection id.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Number of times this message has been re-enqueued after a handler failure.
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedMessage {
    /// Creates a new message with a generated id and the current timestamp.
    pub fn new(
        user_id: UserId,
        session_id: SessionId,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            user_id,
            session_id,
            text: text.into(),
            language: language.into(),
            enqueued_at: Utc::now(),
            metadata: HashMap::new(),
            attempts: 0,
        }
    }

    /// Attaches a metadata entry, returning the message for chaining.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A request to a text-generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// The user's latest utterance.
    pub prompt: String,
    /// Prior turns, oldest first.
    pub history: Vec<Turn>,
    /// Language the reply should be written in.
    pub language: String,
}
