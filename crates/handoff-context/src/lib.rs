// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling conversation context per session.
//!
//! Each session keeps at most `max_turns` turns in arrival order and expires
//! after a sliding idle TTL. History handed to text-generation backends is
//! trimmed to a token budget with [`ConversationContext::recent_within_budget`].

pub mod session;
pub mod store;

pub use session::{estimate_tokens, Session};
pub use store::ConversationContext;
