// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session store with sliding idle expiry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use handoff_config::{HandoffPolicyConfig, SessionConfig};
use handoff_core::{HandoffError, SessionId, Turn, UserId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::Session;

/// Per-session rolling context, keyed by session id.
///
/// Every successful read or write refreshes the session's idle timer. A
/// session idle for longer than the TTL behaves as if it never existed and
/// is dropped the next time it is touched or swept.
pub struct ConversationContext {
    sessions: DashMap<SessionId, Session>,
    max_turns: usize,
    ttl: Duration,
    token_budget: usize,
    reset_phrases: Vec<String>,
}

impl ConversationContext {
    pub fn new(max_turns: usize, ttl: Duration, token_budget: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns: max_turns.max(1),
            ttl,
            token_budget,
            reset_phrases: Vec::new(),
        }
    }

    pub fn from_config(session: &SessionConfig, policy: &HandoffPolicyConfig) -> Self {
        Self::new(session.max_turns, session.ttl(), session.context_token_budget)
            .with_reset_phrases(policy.reset_phrases.iter().cloned())
    }

    /// Sets the utterances that count as a request to reset the context.
    pub fn with_reset_phrases<I>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.reset_phrases = phrases.into_iter().map(|p| normalize(&p)).collect();
        self
    }

    /// Default token budget for history handed to backends.
    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Returns the live session, creating it on first contact.
    ///
    /// An expired session is replaced by a fresh one.
    pub fn open(&self, user_id: &UserId, session_id: &SessionId, language: &str) -> Session {
        let mut entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                debug!(session_id = %session_id, user_id = %user_id, "session created");
                Session::new(user_id.clone(), session_id.clone(), language.to_string())
            });
        if entry.is_expired(self.ttl) {
            debug!(session_id = %session_id, "expired session replaced");
            *entry = Session::new(user_id.clone(), session_id.clone(), language.to_string());
        }
        entry.touch();
        entry.clone()
    }

    /// Appends a turn to a live session.
    pub fn append(&self, session_id: &SessionId, turn: Turn) -> Result<(), HandoffError> {
        let mut session = self
            .live(session_id)
            .ok_or_else(|| HandoffError::session_not_found(session_id.as_str()))?;
        session.push(turn, self.max_turns);
        Ok(())
    }

    /// All retained turns, oldest first. Empty for unknown or expired sessions.
    pub fn recent(&self, session_id: &SessionId) -> Vec<Turn> {
        self.live(session_id)
            .map(|s| s.turns().cloned().collect())
            .unwrap_or_default()
    }

    /// The newest turns whose estimated token cost fits `max_tokens`, oldest first.
    pub fn recent_within_budget(&self, session_id: &SessionId, max_tokens: usize) -> Vec<Turn> {
        self.live(session_id)
            .map(|s| s.within_budget(max_tokens))
            .unwrap_or_default()
    }

    /// Drops every turn of a session but keeps the session itself.
    ///
    /// Returns `false` if the session is unknown or expired.
    pub fn clear(&self, session_id: &SessionId) -> bool {
        match self.live(session_id) {
            Some(mut session) => {
                session.clear_turns();
                debug!(session_id = %session_id, "session context cleared");
                true
            }
            None => false,
        }
    }

    /// Deletes a session outright (client disconnect).
    pub fn remove(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.remove(session_id).map(|(_, s)| s)
    }

    /// Snapshot of a live session.
    pub fn get(&self, session_id: &SessionId) -> Option<Session> {
        self.live(session_id).map(|s| s.clone())
    }

    pub fn set_metadata(
        &self,
        session_id: &SessionId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HandoffError> {
        let mut session = self
            .live(session_id)
            .ok_or_else(|| HandoffError::session_not_found(session_id.as_str()))?;
        session.metadata.insert(key.into(), value.into());
        Ok(())
    }

    /// Whether the whole utterance is one of the configured reset phrases.
    pub fn is_reset_utterance(&self, text: &str) -> bool {
        let text = normalize(text);
        !text.is_empty() && self.reset_phrases.iter().any(|p| *p == text)
    }

    /// Removes every expired session, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(self.ttl));
        before.saturating_sub(self.sessions.len())
    }

    /// Number of sessions held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Spawns a task purging expired sessions every `interval` until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first immediate tick.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            info!(purged, remaining = store.len(), "expired sessions purged");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("session sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// The session, refreshed, if it exists and has not expired.
    fn live(&self, session_id: &SessionId) -> Option<RefMut<'_, SessionId, Session>> {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            if !session.is_expired(self.ttl) {
                session.touch();
                return Some(session);
            }
        }
        if self
            .sessions
            .remove_if(session_id, |_, s| s.is_expired(self.ttl))
            .is_some()
        {
            debug!(session_id = %session_id, "expired session dropped");
        }
        None
    }
}

fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase()
}
