// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles a complete [`HandoffEngine`] over mock backends,
//! in-memory ticket storage, a static agent roster and a recording notifier.

use std::sync::Arc;

use handoff_agent::{HandoffEngine, Submission};
use handoff_config::HandoffConfig;
use handoff_core::{AgentId, HandoffError, SessionId, UserId};
use handoff_resilience::{BackendPolicy, ResponseProvider};
use handoff_ticket::{InMemoryTicketStore, StaticAgentDirectory, TicketLifecycle};

use crate::flaky_store::FlakyTicketStore;
use crate::mock_backend::MockBackend;
use crate::recording_notifier::RecordingNotifier;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: HandoffConfig,
    backends: Vec<(Arc<MockBackend>, BackendPolicy)>,
    notifier: RecordingNotifier,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = HandoffConfig::default();
        config.agents.authorized = vec!["alice".into(), "bob".into()];
        config.agents.supervisors = vec!["sam".into()];
        Self {
            config,
            backends: Vec::new(),
            notifier: RecordingNotifier::new(),
        }
    }

    /// Adjusts the configuration the engine is built from.
    pub fn with_config(mut self, edit: impl FnOnce(&mut HandoffConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Appends a backend with the default policy (three attempts).
    pub fn with_backend(self, backend: MockBackend) -> Self {
        self.with_backend_policy(backend, BackendPolicy::default())
    }

    pub fn with_backend_policy(mut self, backend: MockBackend, policy: BackendPolicy) -> Self {
        self.backends.push((Arc::new(backend), policy));
        self
    }

    /// Uses a notifier whose deliveries all fail.
    pub fn with_failing_notifier(mut self) -> Self {
        self.notifier = RecordingNotifier::failing();
        self
    }

    pub fn build(self) -> TestHarness {
        let notifier = Arc::new(self.notifier);
        let store = Arc::new(InMemoryTicketStore::new());
        let faults = Arc::new(FlakyTicketStore::new(store.clone()));
        let directory = Arc::new(StaticAgentDirectory::from_config(&self.config.agents));

        let mut provider = ResponseProvider::from_config(&self.config.providers);
        for (backend, policy) in &self.backends {
            provider = provider.with_backend(backend.clone(), *policy);
        }

        let engine = HandoffEngine::from_config(
            &self.config,
            provider,
            faults.clone(),
            directory,
            notifier.clone(),
        );

        TestHarness {
            engine: Arc::new(engine),
            notifier,
            store,
            faults,
            backends: self.backends.into_iter().map(|(b, _)| b).collect(),
            config: self.config,
        }
    }
}

/// A complete engine over mock collaborators.
pub struct TestHarness {
    pub engine: Arc<HandoffEngine>,
    /// Every event the engine and ticket lifecycle emitted.
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<InMemoryTicketStore>,
    /// The store the engine sees; wraps `store` and can be told to fail.
    pub faults: Arc<FlakyTicketStore>,
    /// Backends in priority order.
    pub backends: Vec<Arc<MockBackend>>,
    pub config: HandoffConfig,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Submits `text` from `user` in `session`, in English.
    pub async fn send(
        &self,
        user: &str,
        session: &str,
        text: &str,
    ) -> Result<Submission, HandoffError> {
        self.engine
            .submit_message(UserId::from(user), SessionId::from(session), text, "en")
            .await
    }

    pub fn tickets(&self) -> &TicketLifecycle {
        self.engine.tickets()
    }

    pub fn backend(&self, index: usize) -> &Arc<MockBackend> {
        &self.backends[index]
    }

    pub fn agent(name: &str) -> AgentId {
        AgentId::from(name)
    }
}
