// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single conversation session.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use handoff_core::{SessionId, Turn, UserId};
use tokio::time::Instant;

/// Rough token cost of a text: a quarter token per character, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Short-lived per-user conversational state.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub language: String,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    turns: VecDeque<Turn>,
    last_activity: Instant,
}

impl Session {
    pub(crate) fn new(user_id: UserId, session_id: SessionId, language: String) -> Self {
        Self {
            user_id,
            session_id,
            language,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            turns: VecDeque::new(),
            last_activity: Instant::now(),
        }
    }

    /// Turns in chronological order.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Time since the last read or write.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub(crate) fn is_expired(&self, ttl: Duration) -> bool {
        self.idle_for() >= ttl
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Appends a turn, evicting the oldest once `max_turns` is reached.
    pub(crate) fn push(&mut self, turn: Turn, max_turns: usize) {
        while self.turns.len() >= max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub(crate) fn clear_turns(&mut self) {
        self.turns.clear();
    }

    /// Newest turns whose summed cost fits `max_tokens`, oldest first.
    ///
    /// Walks backward from the newest turn and stops at the first turn that
    /// would overflow the budget, so the result is always a contiguous suffix.
    pub(crate) fn within_budget(&self, max_tokens: usize) -> Vec<Turn> {
        let mut used = 0;
        let mut kept = Vec::new();
        for turn in self.turns.iter().rev() {
            let cost = estimate_tokens(&turn.text);
            if used + cost > max_tokens {
                break;
            }
            used += cost;
            kept.push(turn.clone());
        }
        kept.reverse();
        kept
    }
}
