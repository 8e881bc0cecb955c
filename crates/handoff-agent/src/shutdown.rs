// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the serve loop and session sweeper monitor.
//! Messages still queued are processed before the process exits.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::HandoffEngine;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Processes queued messages until the queue is empty, a batch makes no
/// progress, or `timeout` passes. Returns the number processed.
pub async fn drain_queue(engine: &HandoffEngine, timeout: Duration) -> usize {
    let pending = engine.queue().size().await;
    if pending == 0 {
        info!("no queued messages to drain");
        return 0;
    }
    info!(count = pending, "draining queued messages");

    let mut processed = 0;
    let drained = tokio::time::timeout(timeout, async {
        loop {
            let batch = engine.drain().await;
            if batch == 0 {
                break;
            }
            processed += batch;
        }
    })
    .await;

    let remaining = engine.queue().size().await;
    if drained.is_err() {
        warn!(processed, remaining, "timeout reached, abandoning queued messages");
    } else if remaining > 0 {
        warn!(processed, remaining, "queued messages left unprocessed");
    } else {
        info!(processed, "queue drained");
    }
    processed
}
