// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! When a conversation goes to a human.

use handoff_config::HandoffPolicyConfig;
use handoff_core::DEFAULT_PRIORITY;

/// Ticket reason when the user asks for a person.
pub const USER_REQUEST_REASON: &str = "user requested a human agent";

/// Ticket reason when no backend could answer.
pub const PROVIDER_FAILURE_REASON: &str = "AI assistant unavailable";

/// Phrase matching and ticket priorities for the AI-vs-human decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffPolicy {
    phrases: Vec<String>,
    pub request_priority: u8,
    pub provider_failure_priority: u8,
}

impl HandoffPolicy {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            request_priority: DEFAULT_PRIORITY,
            provider_failure_priority: DEFAULT_PRIORITY,
        }
    }

    pub fn from_config(config: &HandoffPolicyConfig) -> Self {
        Self {
            request_priority: config.request_priority,
            provider_failure_priority: config.provider_failure_priority,
            ..Self::new(&config.phrases)
        }
    }

    /// Whether the text contains one of the handoff phrases, ignoring case.
    pub fn wants_human(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.phrases.iter().any(|p| text.contains(p.as_str()))
    }
}

impl Default for HandoffPolicy {
    fn default() -> Self {
        Self::from_config(&HandoffPolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases_match_case_insensitively() {
        let policy = HandoffPolicy::default();
        assert!(policy.wants_human("Can I TALK TO A HUMAN please?"));
        assert!(policy.wants_human("I want a real person"));
        assert!(!policy.wants_human("how do I renew my passport"));
    }

    #[test]
    fn blank_phrases_are_ignored() {
        let policy = HandoffPolicy::new(["", "  ", "operator"]);
        assert!(!policy.wants_human("hello"));
        assert!(policy.wants_human("get me an Operator"));
    }

    #[test]
    fn priorities_come_from_config() {
        let config = HandoffPolicyConfig {
            request_priority: 4,
            provider_failure_priority: 2,
            ..HandoffPolicyConfig::default()
        };
        let policy = HandoffPolicy::from_config(&config);
        assert_eq!(policy.request_priority, 4);
        assert_eq!(policy.provider_failure_priority, 2);
    }
}
