// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound event delivery trait.

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::events::HandoffEvent;

/// Fan-out of lifecycle events to interested parties.
///
/// Delivery is fire-and-forget from the engine's point of view: a returned
/// error is logged by the caller and never rolls back the state change that
/// produced the event.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, event: HandoffEvent) -> Result<(), HandoffError>;
}
