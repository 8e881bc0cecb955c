// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff serve` command implementation.
//!
//! Wires the engine from configuration, publishes every lifecycle event to
//! stdout as one JSON object per line, and feeds stdin lines through the
//! console protocol until EOF or a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use handoff_agent::HandoffEngine;
use handoff_agent::shutdown::install_signal_handler;
use handoff_bus::{EventBus, EventFilter, SharedEventBus};
use handoff_config::{HandoffConfig, ProvidersConfig};
use handoff_core::{HandoffError, HandoffEvent};
use handoff_openai::OpenAiBackend;
use handoff_resilience::{BackendPolicy, ResponseProvider};
use handoff_ticket::{InMemoryTicketStore, StaticAgentDirectory};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::console;

/// Time allowed for queued messages to be processed on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the engine until stdin closes or a shutdown signal arrives.
///
/// A non-empty `event_types` limits the printed stream to those event types.
pub async fn run_serve(config: HandoffConfig, event_types: Vec<String>) -> Result<(), HandoffError> {
    init_tracing(&config.service.log_level);
    info!(service = config.service.name.as_str(), "starting handoff serve");

    let provider = build_provider(&config.providers)?;
    let bus: SharedEventBus = EventBus::new().shared();
    let engine = Arc::new(HandoffEngine::from_config(
        &config,
        provider,
        Arc::new(InMemoryTicketStore::new()),
        Arc::new(StaticAgentDirectory::from_config(&config.agents)),
        bus.clone(),
    ));

    let cancel = install_signal_handler();
    let sweeper = engine.spawn_sweeper(cancel.clone());
    let filter = if event_types.is_empty() {
        EventFilter::new()
    } else {
        EventFilter::new().with_types(event_types)
    };
    let printer = tokio::spawn(print_events(Arc::clone(&bus), filter, cancel.clone()));

    read_console(&engine, cancel.clone()).await;

    cancel.cancel();
    engine.shutdown(DRAIN_TIMEOUT).await;
    if let Err(e) = sweeper.await {
        warn!(error = %e, "session sweeper task failed");
    }
    if let Err(e) = printer.await {
        warn!(error = %e, "event printer task failed");
    }

    info!("handoff serve shutdown complete");
    Ok(())
}

/// Builds the response provider from the configured backends, in order.
fn build_provider(config: &ProvidersConfig) -> Result<ResponseProvider, HandoffError> {
    let mut provider = ResponseProvider::from_config(config);
    for backend in &config.backends {
        let client = OpenAiBackend::new(backend)?;
        info!(
            backend = backend.name.as_str(),
            endpoint = client.endpoint(),
            enabled = backend.enabled,
            "backend configured"
        );
        provider = provider.with_backend(Arc::new(client), BackendPolicy::from(backend));
    }
    if config.backends.iter().all(|b| !b.enabled) {
        warn!("no enabled backends, every question will be handed off");
    }
    Ok(provider)
}

async fn read_console(engine: &HandoffEngine, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = cancel.cancelled() => {
                info!("console input stopped by shutdown signal");
                return;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                return;
            }
        };

        let result = match console::parse_line(&line) {
            Ok(Some(command)) => console::execute(engine, command).await,
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        match result {
            Ok(Some(report)) => println!("{report}"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, category = ?e.category(), "console command failed"),
        }
    }
}

/// Writes each bus event that passes `filter` to stdout as a JSON line.
async fn print_events(bus: SharedEventBus, filter: EventFilter, cancel: CancellationToken) {
    let mut rx = bus.subscribe();
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) if filter.matches(&event) => print_event(&event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => {
                // Flush what was published before the signal.
                while let Ok(event) = rx.try_recv() {
                    if filter.matches(&event) {
                        print_event(&event);
                    }
                }
                debug!("event printer shutting down");
                break;
            }
        }
    }
}

fn print_event(event: &HandoffEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(event_type = event.event_type(), error = %e, "failed to encode event"),
    }
}

/// Initialize the tracing subscriber with the configured log level.
///
/// Logs go to stderr; stdout carries the event stream.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("handoff={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use handoff_config::BackendConfig;

    use super::*;

    fn backend(name: &str, enabled: bool) -> BackendConfig {
        BackendConfig {
            name: name.into(),
            enabled,
            base_url: "http://localhost:8000/v1".into(),
            api_key: None,
            model: "test-model".into(),
            max_retries: 2,
            confidence: 0.7,
            max_tokens: 64,
        }
    }

    #[test]
    fn provider_keeps_backend_order() {
        let config = ProvidersConfig {
            backends: vec![backend("primary", true), backend("secondary", false)],
            ..Default::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.backend_names(), ["primary", "secondary"]);
    }

    #[test]
    fn provider_without_backends_is_valid() {
        let provider = build_provider(&ProvidersConfig::default()).unwrap();
        assert!(provider.backend_names().is_empty());
    }

    #[tokio::test]
    async fn printer_stops_on_cancel() {
        let bus = EventBus::new().shared();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(print_events(
            Arc::clone(&bus),
            EventFilter::new(),
            cancel.clone(),
        ));
        while !bus.has_subscribers() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("printer should stop")
            .unwrap();
    }
}
