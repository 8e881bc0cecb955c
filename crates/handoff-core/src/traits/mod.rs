// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The engine talks to everything it does not own (text-generation backends,
//! the ticket document store, the agent roster, event delivery, the
//! rate-limit store) through these traits. All of them use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod backend;
pub mod directory;
pub mod notifier;
pub mod ratelimit;
pub mod store;

pub use backend::CompletionBackend;
pub use directory::AgentDirectory;
pub use notifier::Notifier;
pub use ratelimit::{RateLimitStore, WindowCheck};
pub use store::TicketStore;
